//! maskinporten-token - Fetch Maskinporten access tokens from the command line
//!
//! Main entry point for the `maskinporten-token` binary.

use anyhow::{Context, Result};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use maskinporten_client::cli::{Cli, Commands};
use maskinporten_client::config::Config;
use maskinporten_client::MaskinportenClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load and validate settings
    let config = Config::load(&cli.config, &cli)?;
    config.validate()?;

    let configuration = config
        .to_client_configuration()
        .context("Failed to build client configuration")?;
    tracing::debug!(
        issuer = configuration.issuer(),
        token_endpoint = %configuration.token_endpoint(),
        "Loaded client configuration"
    );
    let client = MaskinportenClient::new(configuration)?;

    match cli.command {
        Commands::Token { request, claims } => {
            let request = request.to_request();
            tracing::info!("Requesting access token for scopes: {}", request.scopes());

            let token = client.get_token(&request).await?;
            println!("{}", token.token());

            if claims {
                println!("{}", serde_json::to_string_pretty(token.claims_json())?);
            }
            Ok(())
        }
        Commands::Assertion { request } => {
            let assertion = client.assertion(&request.to_request())?;
            println!("{}", assertion);
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "maskinporten_client=debug"
    } else {
        "maskinporten_client=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
