//! Settings management for the `maskinporten-token` binary
//!
//! This module handles loading, parsing and validating the settings file,
//! applying environment variable and CLI overrides, and turning the result
//! into a [`ClientConfiguration`] by reading the referenced key files.

use crate::configuration::{
    ClientConfiguration, Environment, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SAFETY_MARGIN_SECS,
};
use crate::error::{MaskinportenError, Result};
use crate::jwt::signer::{RsaJwk, SigningMaterial};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure
///
/// Mirrors the YAML settings file. Which signing form is used is decided by
/// which paths are set; see [`SigningConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Environment name: `test`, `ver2`, `prod` or `custom`
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Audience, required for the `custom` environment
    #[serde(default)]
    pub audience: Option<String>,

    /// Token endpoint URL, required for the `custom` environment
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// Client identifier
    #[serde(default)]
    pub issuer: String,

    /// Default consumer organization for delegated tokens
    #[serde(default)]
    pub consumer_org: Option<String>,

    /// Seconds before expiry at which tokens are refreshed
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Timeout for each token exchange
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Signing key settings
    #[serde(default)]
    pub signing: SigningConfig,
}

/// Signing key settings
///
/// Exactly one form must be configured:
///
/// - certificate: `certificate_path` and `private_key_path`
/// - key pair: `private_key_path`, optionally `public_key_path` and `key_id`
/// - JWK: `jwk_path` alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// PEM certificate sent as `x5c`
    #[serde(default)]
    pub certificate_path: Option<String>,

    /// PEM private key (PKCS#8 or PKCS#1)
    #[serde(default)]
    pub private_key_path: Option<String>,

    /// PEM public key, checked against the private key
    #[serde(default)]
    pub public_key_path: Option<String>,

    /// Key identifier sent as `kid`
    #[serde(default)]
    pub key_id: Option<String>,

    /// RSA JSON Web Key holding the private key
    #[serde(default)]
    pub jwk_path: Option<String>,
}

/// The signing form selected by a [`SigningConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningForm {
    /// Certificate plus private key
    Certificate,
    /// Private key, optionally with public key and key id
    KeyPair,
    /// JSON Web Key
    Jwk,
}

fn default_environment() -> String {
    "test".to_string()
}

fn default_safety_margin_secs() -> u64 {
    DEFAULT_SAFETY_MARGIN_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl SigningConfig {
    /// Determines the configured signing form.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::Config`] when no form or more than one
    /// form is configured.
    pub fn form(&self) -> Result<SigningForm> {
        let has_key = is_set(&self.private_key_path);
        let has_cert = is_set(&self.certificate_path);
        let has_jwk = is_set(&self.jwk_path);
        let has_pair_extras = is_set(&self.public_key_path) || is_set(&self.key_id);

        match (has_cert, has_key, has_jwk) {
            (true, true, false) if has_pair_extras => Err(MaskinportenError::Config(
                "signing: both a certificate and a key pair are configured".to_string(),
            )),
            (true, true, false) => Ok(SigningForm::Certificate),
            (true, false, false) => Err(MaskinportenError::Config(
                "signing.certificate_path requires signing.private_key_path".to_string(),
            )),
            (false, true, false) => Ok(SigningForm::KeyPair),
            (false, false, true) if !has_pair_extras => Ok(SigningForm::Jwk),
            (false, false, false) => Err(MaskinportenError::Config(
                "signing: no certificate, key pair or JWK configured".to_string(),
            )),
            _ => Err(MaskinportenError::Config(
                "signing: more than one of certificate, key pair and JWK is configured"
                    .to_string(),
            )),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Config {
    /// Load settings from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the settings file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            environment: default_environment(),
            audience: None,
            token_endpoint: None,
            issuer: String::new(),
            consumer_org: None,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            signing: SigningConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MaskinportenError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MaskinportenError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(environment) = std::env::var("MASKINPORTEN_ENVIRONMENT") {
            self.environment = environment;
        }

        if let Ok(issuer) = std::env::var("MASKINPORTEN_ISSUER") {
            self.issuer = issuer;
        }

        if let Ok(audience) = std::env::var("MASKINPORTEN_AUDIENCE") {
            self.audience = Some(audience);
        }

        if let Ok(token_endpoint) = std::env::var("MASKINPORTEN_TOKEN_ENDPOINT") {
            self.token_endpoint = Some(token_endpoint);
        }

        if let Ok(consumer_org) = std::env::var("MASKINPORTEN_CONSUMER_ORG") {
            self.consumer_org = Some(consumer_org);
        }

        if let Ok(margin) = std::env::var("MASKINPORTEN_SAFETY_MARGIN_SECS") {
            if let Ok(value) = margin.parse() {
                self.safety_margin_secs = value;
            } else {
                tracing::warn!("Invalid MASKINPORTEN_SAFETY_MARGIN_SECS: {}", margin);
            }
        }

        if let Ok(timeout) = std::env::var("MASKINPORTEN_REQUEST_TIMEOUT_SECS") {
            if let Ok(value) = timeout.parse() {
                self.request_timeout_secs = value;
            } else {
                tracing::warn!("Invalid MASKINPORTEN_REQUEST_TIMEOUT_SECS: {}", timeout);
            }
        }

        // Signing overrides
        if let Ok(path) = std::env::var("MASKINPORTEN_CERTIFICATE_PATH") {
            self.signing.certificate_path = Some(path);
        }

        if let Ok(path) = std::env::var("MASKINPORTEN_PRIVATE_KEY_PATH") {
            self.signing.private_key_path = Some(path);
        }

        if let Ok(path) = std::env::var("MASKINPORTEN_PUBLIC_KEY_PATH") {
            self.signing.public_key_path = Some(path);
        }

        if let Ok(key_id) = std::env::var("MASKINPORTEN_KEY_ID") {
            self.signing.key_id = Some(key_id);
        }

        if let Ok(path) = std::env::var("MASKINPORTEN_JWK_PATH") {
            self.signing.jwk_path = Some(path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(environment) = &cli.environment {
            self.environment = environment.clone();
        }

        if let Some(issuer) = &cli.issuer {
            self.issuer = issuer.clone();
        }
    }

    /// Resolves the configured environment.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::Config`] for unknown names, and for
    /// `custom` without both `audience` and `token_endpoint`.
    pub fn environment(&self) -> Result<Environment> {
        if self.environment.trim().eq_ignore_ascii_case("custom") {
            return match (&self.audience, &self.token_endpoint) {
                (Some(audience), Some(token_endpoint))
                    if !audience.is_empty() && !token_endpoint.is_empty() =>
                {
                    Ok(Environment::custom(audience, token_endpoint))
                }
                _ => Err(MaskinportenError::Config(
                    "custom environment requires audience and token_endpoint".to_string(),
                )),
            };
        }

        self.environment.parse()
    }

    /// Validate the settings
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(MaskinportenError::Config(
                "issuer must be set (config file or MASKINPORTEN_ISSUER)".to_string(),
            ));
        }

        self.environment()?;

        if self.request_timeout_secs == 0 {
            return Err(MaskinportenError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.signing.form()?;

        Ok(())
    }

    /// Builds the client configuration, reading key material from disk
    ///
    /// # Errors
    ///
    /// Returns error if validation fails, a key file cannot be read, or the
    /// key material is unusable
    pub fn to_client_configuration(&self) -> Result<ClientConfiguration> {
        self.validate()?;

        let signing = self.load_signing_material()?;
        let mut configuration = ClientConfiguration::new(self.environment()?, &self.issuer, signing)?
            .with_safety_margin_secs(self.safety_margin_secs)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(consumer_org) = &self.consumer_org {
            configuration = configuration.with_consumer_org(consumer_org);
        }

        Ok(configuration)
    }

    fn load_signing_material(&self) -> Result<SigningMaterial> {
        let signing = &self.signing;
        let key_id = signing.key_id.clone().filter(|k| !k.is_empty());

        match signing.form()? {
            SigningForm::Certificate => SigningMaterial::certificate(
                &read_file("certificate", signing.certificate_path.as_deref())?,
                &read_file("private key", signing.private_key_path.as_deref())?,
            ),
            SigningForm::KeyPair => {
                let private_key = read_file("private key", signing.private_key_path.as_deref())?;
                if is_set(&signing.public_key_path) {
                    let public_key =
                        read_file("public key", signing.public_key_path.as_deref())?;
                    SigningMaterial::key_pair(&public_key, &private_key, key_id)
                } else {
                    SigningMaterial::private_key(&private_key, key_id)
                }
            }
            SigningForm::Jwk => {
                let jwk = RsaJwk::from_json(&read_file("JWK", signing.jwk_path.as_deref())?)?;
                SigningMaterial::jwk(&jwk)
            }
        }
    }
}

fn read_file(what: &str, path: Option<&str>) -> Result<String> {
    let path = path
        .ok_or_else(|| MaskinportenError::Config(format!("no {} path configured", what)))?;
    std::fs::read_to_string(path).map_err(|e| {
        MaskinportenError::KeyMaterial(format!("Failed to read {} from {}: {}", what, path, e))
    })
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
