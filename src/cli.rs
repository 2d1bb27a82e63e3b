//! Command-line interface definition for maskinporten-token
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for fetching access tokens and inspecting assertions.

use clap::{Args, Parser, Subcommand};

use crate::request::TokenRequest;

/// maskinporten-token - Fetch Maskinporten access tokens
///
/// Signs a JWT-bearer assertion with the configured key and exchanges it
/// at the token endpoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "maskinporten-token")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, env = "MASKINPORTEN_CONFIG", default_value = "maskinporten.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the environment from settings (test, ver2, prod, custom)
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Override the issuer (client id) from settings
    #[arg(short, long)]
    pub issuer: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Obtain an access token and print it
    Token {
        /// Token request parameters
        #[command(flatten)]
        request: RequestArgs,

        /// Also print the decoded access token claims
        #[arg(long)]
        claims: bool,
    },

    /// Print a signed assertion without contacting the token endpoint
    Assertion {
        /// Token request parameters
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Parameters shared by commands that build a token request
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Scopes to request; joined with spaces
    #[arg(required = true)]
    pub scopes: Vec<String>,

    /// Organization number to request a delegated token for
    #[arg(long)]
    pub consumer_org: Option<String>,

    /// Value of the iss_onbehalfof claim
    #[arg(long)]
    pub on_behalf_of: Option<String>,

    /// Resource the token is restricted to
    #[arg(long)]
    pub audience: Option<String>,

    /// Person identifier for end-user restricted tokens
    #[arg(long)]
    pub pid: Option<String>,
}

impl RequestArgs {
    /// Builds the token request described by these arguments
    pub fn to_request(&self) -> TokenRequest {
        let mut builder = TokenRequest::builder().with_scopes(&self.scopes);
        if let Some(consumer_org) = &self.consumer_org {
            builder = builder.with_consumer_org(consumer_org);
        }
        if let Some(on_behalf_of) = &self.on_behalf_of {
            builder = builder.with_on_behalf_of(on_behalf_of);
        }
        if let Some(audience) = &self.audience {
            builder = builder.with_audience(audience);
        }
        if let Some(pid) = &self.pid {
            builder = builder.with_pid(pid);
        }
        builder.build()
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_token_command() {
        let cli = Cli::try_parse_from(["maskinporten-token", "token", "ks:fiks", "ks:other"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert_eq!(cli.config, "maskinporten.yaml");
        assert!(!cli.verbose);

        if let Commands::Token { request, claims } = cli.command {
            assert_eq!(request.scopes, vec!["ks:fiks", "ks:other"]);
            assert!(!claims);
            assert_eq!(request.to_request(), TokenRequest::new("ks:fiks ks:other"));
        } else {
            panic!("Expected Token command");
        }
    }

    #[test]
    fn test_cli_parse_token_with_request_flags() {
        let cli = Cli::try_parse_from([
            "maskinporten-token",
            "token",
            "ks:fiks",
            "--consumer-org",
            "111111111",
            "--on-behalf-of",
            "obo",
            "--audience",
            "https://api.example.no",
            "--pid",
            "12345678901",
            "--claims",
        ])
        .unwrap();

        if let Commands::Token { request, claims } = cli.command {
            assert!(claims);
            let request = request.to_request();
            assert_eq!(request.consumer_org(), Some("111111111"));
            assert_eq!(request.on_behalf_of(), Some("obo"));
            assert_eq!(request.audience(), Some("https://api.example.no"));
            assert_eq!(request.pid(), Some("12345678901"));
        } else {
            panic!("Expected Token command");
        }
    }

    #[test]
    fn test_cli_parse_assertion_command() {
        let cli = Cli::try_parse_from(["maskinporten-token", "assertion", "ks:fiks"]).unwrap();
        assert!(matches!(cli.command, Commands::Assertion { .. }));
    }

    #[test]
    fn test_cli_requires_scopes() {
        assert!(Cli::try_parse_from(["maskinporten-token", "token"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "maskinporten-token",
            "--config",
            "other.yaml",
            "--verbose",
            "--environment",
            "ver2",
            "--issuer",
            "my-client",
            "assertion",
            "s",
        ])
        .unwrap();

        assert_eq!(cli.config, "other.yaml");
        assert!(cli.verbose);
        assert_eq!(cli.environment.as_deref(), Some("ver2"));
        assert_eq!(cli.issuer.as_deref(), Some("my-client"));
    }
}
