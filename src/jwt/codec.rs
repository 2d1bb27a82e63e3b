//! Compact JWT encoding and decoding
//!
//! Encoding and decoding are plain functions over their inputs; nothing here
//! holds state between calls.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MaskinportenError, Result};
use crate::jwt::signer::Signer;

/// Serializes `claims` and signs `header.payload` with `signer`.
///
/// The header algorithm is forced to RS256.
pub fn encode<T: Serialize>(header: &Header, claims: &T, signer: &Signer) -> Result<String> {
    let mut header = header.clone();
    header.alg = Algorithm::RS256;
    Ok(jsonwebtoken::encode(&header, claims, signer.encoding_key())?)
}

/// Verifies an RS256 token against `key` and returns its header and claims.
///
/// The signature and `exp` (when present) are checked; `aud` is not, since
/// the expected audience depends on who is inspecting the token.
///
/// # Errors
///
/// Returns [`MaskinportenError::SignatureVerification`] when the signature
/// does not match `key`, and [`MaskinportenError::Jwt`] for malformed or
/// expired tokens.
pub fn decode<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<(Header, T)> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<T>(token, key, &validation) {
        Ok(data) => Ok((data.header, data.claims)),
        Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => Err(
            MaskinportenError::SignatureVerification("JWT signature does not match key".to_string()),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Reads the claim set of a compact JWT without verifying anything.
///
/// Used to inspect access tokens issued by the token endpoint, which this
/// crate treats as bearer strings.
pub fn decode_payload_unverified(token: &str) -> Result<Map<String, Value>> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(MaskinportenError::InvalidResponse(
                "token is not a compact JWT".to_string(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| MaskinportenError::InvalidResponse(format!("JWT payload is not base64url: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}
