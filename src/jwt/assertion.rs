//! JWT-bearer assertion construction
//!
//! An assertion is a short-lived JWT signed with the client's key that proves
//! the client's identity to the token endpoint (RFC 7523). Every assertion
//! carries a fresh `jti`, so no two are identical even for the same request.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::configuration::ClientConfiguration;
use crate::error::Result;
use crate::jwt::codec;
use crate::jwt::signer::SigningMaterial;
use crate::request::TokenRequest;

/// Lifetime of an assertion, in seconds.
pub const ASSERTION_LIFETIME_SECS: i64 = 120;

/// Claim set of a JWT-bearer assertion.
///
/// Optional claims are omitted from the serialized JWT when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Client identifier
    pub iss: String,

    /// Organization the client acts on behalf of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss_onbehalfof: Option<String>,

    /// Resource the token is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// End-user person identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,

    /// Token endpoint audience
    pub aud: String,

    /// Issued at, Unix seconds
    pub iat: i64,

    /// Expiry, Unix seconds
    pub exp: i64,

    /// Space-separated scopes, possibly empty
    pub scope: String,

    /// Unique assertion identifier
    pub jti: String,

    /// Organization a delegated token is requested for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_org: Option<String>,
}

/// Builds and signs assertions for one client configuration.
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    configuration: Arc<ClientConfiguration>,
    clock: Arc<dyn Clock>,
}

impl AssertionBuilder {
    /// Creates a builder reading time from `clock`.
    pub fn new(configuration: Arc<ClientConfiguration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            configuration,
            clock,
        }
    }

    /// The consumer organization that applies to `request`.
    ///
    /// The request's value wins over the configured default; empty values
    /// count as absent. Used for both the claim and the HTTP header.
    pub fn effective_consumer_org<'a>(&'a self, request: &'a TokenRequest) -> Option<&'a str> {
        non_empty(request.consumer_org()).or_else(|| non_empty(self.configuration.consumer_org()))
    }

    /// Claims for `request`, stamped with the current time and a new `jti`.
    pub fn claims(&self, request: &TokenRequest) -> AssertionClaims {
        let iat = self.clock.now().timestamp();

        AssertionClaims {
            iss: self.configuration.issuer().to_string(),
            iss_onbehalfof: non_empty(request.on_behalf_of()).map(str::to_string),
            resource: non_empty(request.audience()).map(str::to_string),
            pid: non_empty(request.pid()).map(str::to_string),
            aud: self.configuration.audience().to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            scope: request.scopes().to_string(),
            jti: Uuid::new_v4().to_string(),
            consumer_org: self.effective_consumer_org(request).map(str::to_string),
        }
    }

    /// JOSE header identifying the signing key.
    ///
    /// Certificate material is sent as `x5c`; key-pair material as `kid`
    /// when a key identifier is configured.
    pub fn header(&self) -> Header {
        let mut header = Header::new(Algorithm::RS256);
        match self.configuration.signing() {
            SigningMaterial::Certificate { certificate, .. } => {
                header.x5c = Some(vec![certificate.to_base64()]);
            }
            SigningMaterial::KeyPair { key_id, .. } => {
                header.kid = key_id.clone();
            }
        }
        header
    }

    /// Builds and signs the compact assertion for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MaskinportenError::Jwt`] if signing fails.
    pub fn build(&self, request: &TokenRequest) -> Result<String> {
        let claims = self.claims(request);
        debug!(
            scope = %claims.scope,
            jti = %claims.jti,
            consumer_org = claims.consumer_org.as_deref().unwrap_or(""),
            "Building JWT-bearer assertion"
        );
        codec::encode(&self.header(), &claims, self.configuration.signing().signer())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
