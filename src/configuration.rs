//! Client configuration
//!
//! [`ClientConfiguration`] holds everything that stays fixed for the lifetime
//! of a [`crate::MaskinportenClient`]: where the token endpoint lives, who the
//! client is, how assertions are signed and how early tokens are refreshed.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MaskinportenError, Result};
use crate::jwt::signer::SigningMaterial;

/// Audience of the test environment.
pub const TEST_AUDIENCE: &str = "https://test.maskinporten.no/";
/// Token endpoint of the test environment.
pub const TEST_TOKEN_ENDPOINT: &str = "https://test.maskinporten.no/token";
/// Audience of the ver2 environment.
pub const VER2_AUDIENCE: &str = "https://ver2.maskinporten.no/";
/// Token endpoint of the ver2 environment.
pub const VER2_TOKEN_ENDPOINT: &str = "https://ver2.maskinporten.no/token";
/// Audience of the production environment.
pub const PROD_AUDIENCE: &str = "https://maskinporten.no/";
/// Token endpoint of the production environment.
pub const PROD_TOKEN_ENDPOINT: &str = "https://maskinporten.no/token";

/// Seconds subtracted from `expires_in` before a token counts as expiring.
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 10;
/// Upper bound on a single token exchange.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// A Maskinporten deployment.
///
/// # Examples
///
/// ```
/// use maskinporten_client::Environment;
///
/// let env: Environment = "ver2".parse().unwrap();
/// assert_eq!(env.audience(), "https://ver2.maskinporten.no/");
/// assert_eq!(env.token_endpoint(), "https://ver2.maskinporten.no/token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test environment
    Test,
    /// Ver2 environment
    Ver2,
    /// Production
    Prod,
    /// Any other deployment, e.g. a local mock
    Custom {
        /// Expected `aud` of assertions
        audience: String,
        /// Token endpoint URL
        token_endpoint: String,
    },
}

impl Environment {
    /// Convenience constructor for [`Environment::Custom`].
    pub fn custom(audience: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        Self::Custom {
            audience: audience.into(),
            token_endpoint: token_endpoint.into(),
        }
    }

    /// Audience assertions must be addressed to.
    pub fn audience(&self) -> &str {
        match self {
            Self::Test => TEST_AUDIENCE,
            Self::Ver2 => VER2_AUDIENCE,
            Self::Prod => PROD_AUDIENCE,
            Self::Custom { audience, .. } => audience,
        }
    }

    /// URL of the token endpoint.
    pub fn token_endpoint(&self) -> &str {
        match self {
            Self::Test => TEST_TOKEN_ENDPOINT,
            Self::Ver2 => VER2_TOKEN_ENDPOINT,
            Self::Prod => PROD_TOKEN_ENDPOINT,
            Self::Custom { token_endpoint, .. } => token_endpoint,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Ver2 => write!(f, "ver2"),
            Self::Prod => write!(f, "prod"),
            Self::Custom { token_endpoint, .. } => write!(f, "custom ({token_endpoint})"),
        }
    }
}

impl FromStr for Environment {
    type Err = MaskinportenError;

    /// Parses the named environments; `custom` needs explicit URLs and is
    /// not accepted here.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "ver2" => Ok(Self::Ver2),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(MaskinportenError::Config(format!(
                "unknown environment '{other}', expected test, ver2 or prod"
            ))),
        }
    }
}

/// Static configuration of a Maskinporten client.
///
/// # Examples
///
/// ```no_run
/// use maskinporten_client::{ClientConfiguration, Environment, SigningMaterial};
///
/// # fn main() -> Result<(), maskinporten_client::MaskinportenError> {
/// let key_pem = std::fs::read_to_string("key.pem")?;
/// let signing = SigningMaterial::private_key(&key_pem, Some("my-kid".to_string()))?;
///
/// let configuration = ClientConfiguration::new(Environment::Test, "my-client-id", signing)?
///     .with_consumer_org("999888777")
///     .with_safety_margin_secs(30);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfiguration {
    audience: String,
    token_endpoint: Url,
    issuer: String,
    safety_margin: Duration,
    signing: SigningMaterial,
    consumer_org: Option<String>,
    request_timeout: Duration,
}

impl ClientConfiguration {
    /// Creates a configuration for `environment`.
    ///
    /// # Arguments
    ///
    /// * `environment` - Deployment whose audience and endpoint are used
    /// * `issuer` - The client's own identifier, sent as `iss`
    /// * `signing` - Key material used to sign assertions
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::Config`] if the issuer or audience is
    /// empty, or the token endpoint is not an absolute http(s) URL.
    pub fn new(
        environment: Environment,
        issuer: impl Into<String>,
        signing: SigningMaterial,
    ) -> Result<Self> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(MaskinportenError::Config("issuer must not be empty".to_string()));
        }

        let audience = environment.audience().to_string();
        if audience.trim().is_empty() {
            return Err(MaskinportenError::Config("audience must not be empty".to_string()));
        }

        let token_endpoint = Url::parse(environment.token_endpoint()).map_err(|e| {
            MaskinportenError::Config(format!(
                "invalid token endpoint '{}': {e}",
                environment.token_endpoint()
            ))
        })?;
        if !matches!(token_endpoint.scheme(), "http" | "https") {
            return Err(MaskinportenError::Config(format!(
                "token endpoint must use http or https, got '{}'",
                token_endpoint.scheme()
            )));
        }

        Ok(Self {
            audience,
            token_endpoint,
            issuer,
            safety_margin: Duration::from_secs(DEFAULT_SAFETY_MARGIN_SECS),
            signing,
            consumer_org: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Sets how many seconds before expiry a token is refreshed.
    pub fn with_safety_margin_secs(mut self, secs: u64) -> Self {
        self.safety_margin = Duration::from_secs(secs);
        self
    }

    /// Sets the default consumer organization for every request.
    ///
    /// An empty string clears the default.
    pub fn with_consumer_org(mut self, consumer_org: impl Into<String>) -> Self {
        let consumer_org = consumer_org.into();
        self.consumer_org = (!consumer_org.is_empty()).then_some(consumer_org);
        self
    }

    /// Sets the timeout applied to each token exchange.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Expected `aud` of assertions.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Token endpoint URL.
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// Client identifier.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Refresh margin.
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Signing material.
    pub fn signing(&self) -> &SigningMaterial {
        &self.signing
    }

    /// Key identifier, for key-pair material.
    pub fn key_id(&self) -> Option<&str> {
        self.signing.key_id()
    }

    /// Default consumer organization.
    pub fn consumer_org(&self) -> Option<&str> {
        self.consumer_org.as_deref()
    }

    /// Timeout for each token exchange.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}
