//! maskinporten-client - OAuth2 JWT-bearer token client for Maskinporten
//!
//! This library obtains access tokens from a Maskinporten-style token
//! endpoint (RFC 7523): it signs a short-lived JWT assertion with the
//! client's key, exchanges it over HTTPS and caches the resulting token until
//! it nears expiry. Concurrent callers asking for the same token share a
//! single exchange.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: `MaskinportenClient`, the public entry point
//! - `request`: `TokenRequest` and its builder, also the cache key
//! - `token`: issued tokens and their decoded claims
//! - `jwt`: signing keys, JWT encode/decode and assertion building
//! - `endpoint`: the HTTP exchange with the token endpoint
//! - `cache`: expiry-aware, per-key memoization
//! - `configuration`: environments and static client configuration
//! - `clock`: injectable time source
//! - `config`, `cli`: settings file and command line of the binary
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use maskinporten_client::{
//!     ClientConfiguration, Environment, MaskinportenClient, SigningMaterial, TokenRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let certificate = std::fs::read_to_string("cert.pem")?;
//!     let private_key = std::fs::read_to_string("key.pem")?;
//!     let signing = SigningMaterial::certificate(&certificate, &private_key)?;
//!
//!     let configuration = ClientConfiguration::new(Environment::Ver2, "my-client-id", signing)?;
//!     let client = MaskinportenClient::new(configuration)?;
//!
//!     let token = client.get_delegated_access_token("999888777", "ks:fiks").await?;
//!     println!("{}", token.bearer_header());
//!
//!     let request = TokenRequest::builder()
//!         .with_scopes(["ks:fiks", "ks:other"])
//!         .with_audience("https://api.example.no")
//!         .build();
//!     let restricted = client.get_token(&request).await?;
//!     println!("{:?}", restricted.claims());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod configuration;
pub mod endpoint;
pub mod error;
pub mod jwt;
pub mod request;
pub mod token;

// Re-export commonly used types
pub use client::{AccessTokenProvider, MaskinportenClient, MaskinportenClientBuilder};
pub use configuration::{ClientConfiguration, Environment};
pub use error::{MaskinportenError, Result};
pub use jwt::signer::{Certificate, RsaJwk, SigningMaterial};
pub use request::{IntoScopes, TokenRequest, TokenRequestBuilder};
pub use token::{AccessTokenClaims, MaskinportenToken};

#[cfg(test)]
pub mod test_utils;
