//! Issued access tokens
//!
//! A [`MaskinportenToken`] is the bearer string returned by the token
//! endpoint together with the instant after which it should be refreshed and
//! the claims read from its JWT payload.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::DecodingKey;
use serde_json::{Map, Value};
use tracing::warn;

use crate::cache::Expiring;
use crate::error::Result;
use crate::jwt::codec;

/// ISO 6523 prefix for Norwegian organization numbers in `consumer.ID`.
const ISO6523_ORGNO_PREFIX: &str = "0192:";

/// Cap on `expires_in` and the safety margin when computing the refresh instant.
const MAX_LIFETIME_SECS: u64 = u32::MAX as u64;

/// Claims of an access token, read without verifying its signature.
///
/// Every field is optional; a claim that is missing or has an unexpected
/// type is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// `aud`
    pub audience: Option<String>,
    /// `scope`
    pub scope: Option<String>,
    /// `iss`
    pub issuer: Option<String>,
    /// `token_type`
    pub token_type: Option<String>,
    /// `exp`
    pub expiration_time: Option<DateTime<Utc>>,
    /// `iat`
    pub issued_at: Option<DateTime<Utc>>,
    /// `client_orgno`
    pub client_orgno: Option<String>,
    /// `jti`
    pub jwt_id: Option<String>,
    /// Organization number from `consumer.ID`, without its ISO 6523 prefix
    pub consumer_org: Option<String>,
}

impl AccessTokenClaims {
    /// Extracts the known claims from a JWT payload.
    pub fn from_json(claims: &Map<String, Value>) -> Self {
        Self {
            audience: claims.get("aud").and_then(audience_claim),
            scope: string_claim(claims, "scope"),
            issuer: string_claim(claims, "iss"),
            token_type: string_claim(claims, "token_type"),
            expiration_time: time_claim(claims, "exp"),
            issued_at: time_claim(claims, "iat"),
            client_orgno: string_claim(claims, "client_orgno"),
            jwt_id: string_claim(claims, "jti"),
            consumer_org: claims
                .get("consumer")
                .and_then(|c| c.get("ID"))
                .and_then(Value::as_str)
                .map(|id| id.strip_prefix(ISO6523_ORGNO_PREFIX).unwrap_or(id).to_string()),
        }
    }
}

fn string_claim(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims.get(name).and_then(Value::as_str).map(str::to_string)
}

fn time_claim(claims: &Map<String, Value>, name: &str) -> Option<DateTime<Utc>> {
    claims
        .get(name)
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

// `aud` may be a single string or an array; the first entry is used.
fn audience_claim(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => values.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// An access token obtained from the token endpoint.
///
/// # Examples
///
/// ```no_run
/// # async fn example(client: &maskinporten_client::MaskinportenClient) -> maskinporten_client::Result<()> {
/// let token = client.get_access_token("ks:fiks").await?;
/// let header = token.bearer_header();
/// assert!(header.starts_with("Bearer "));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MaskinportenToken {
    access_token: String,
    expires_in: u64,
    refresh_after: DateTime<Utc>,
    claims: AccessTokenClaims,
    claims_json: Map<String, Value>,
}

impl MaskinportenToken {
    /// Wraps a token endpoint response received at `now`.
    ///
    /// `refresh_after` is `now + expires_in - safety_margin`.
    pub(crate) fn from_response(
        access_token: String,
        expires_in: u64,
        safety_margin: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let claims_json = match codec::decode_payload_unverified(&access_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Access token claims could not be decoded: {}", e);
                Map::new()
            }
        };
        let lifetime = Duration::seconds(expires_in.min(MAX_LIFETIME_SECS) as i64)
            - Duration::seconds(safety_margin.as_secs().min(MAX_LIFETIME_SECS) as i64);

        Self {
            claims: AccessTokenClaims::from_json(&claims_json),
            access_token,
            expires_in,
            refresh_after: now.checked_add_signed(lifetime).unwrap_or(now),
            claims_json,
        }
    }

    /// The bearer string.
    pub fn token(&self) -> &str {
        &self.access_token
    }

    /// Lifetime in seconds as reported by the token endpoint.
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    /// Instant from which the token is considered expiring.
    pub fn refresh_after(&self) -> DateTime<Utc> {
        self.refresh_after
    }

    /// Returns `true` once `now` has reached [`Self::refresh_after`].
    pub fn is_expiring_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_after
    }

    /// [`Self::is_expiring_at`] against the wall clock.
    pub fn is_expiring(&self) -> bool {
        self.is_expiring_at(Utc::now())
    }

    /// Decoded claims.
    pub fn claims(&self) -> &AccessTokenClaims {
        &self.claims
    }

    /// The raw JWT payload; empty if the token was not a JWT.
    pub fn claims_json(&self) -> &Map<String, Value> {
        &self.claims_json
    }

    /// Value for an HTTP `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Verifies the token's RS256 signature with the issuer's public key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MaskinportenError::SignatureVerification`] when the
    /// signature does not match `key`.
    pub fn verify(&self, key: &DecodingKey) -> Result<Map<String, Value>> {
        let (_, claims) = codec::decode::<Map<String, Value>>(&self.access_token, key)?;
        Ok(claims)
    }
}

impl PartialEq for MaskinportenToken {
    fn eq(&self, other: &Self) -> bool {
        self.access_token == other.access_token && self.claims == other.claims
    }
}

impl Eq for MaskinportenToken {}

impl Expiring for MaskinportenToken {
    fn is_expiring_at(&self, now: DateTime<Utc>) -> bool {
        MaskinportenToken::is_expiring_at(self, now)
    }
}
