//! Error types for the Maskinporten client
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling.

use serde::Deserialize;
use thiserror::Error;

/// Main error type for Maskinporten client operations
///
/// This enum covers configuration and key-material failures detected at
/// construction time, token endpoint failures detected at call time, and the
/// lower-level transport and codec errors that are propagated unchanged.
#[derive(Error, Debug)]
pub enum MaskinportenError {
    /// Invalid or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Private keys, public keys or certificates that cannot be used
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    /// The token endpoint answered with anything other than `200 OK`
    #[error("Unexpected response from token endpoint: HTTP {status} ({reason}): {body}")]
    UnexpectedResponse {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Canonical reason phrase for the status code
        reason: String,
        /// Response body, read for diagnostics
        body: String,
    },

    /// The token endpoint answered `200 OK` with a body that is not a token response
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// A JWT signature did not verify against the supplied key
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// JWT encoding/decoding errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// OAuth2 error body (RFC 6749 section 5.2) returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthErrorBody {
    /// Error code, e.g. `invalid_grant`
    pub error: String,

    /// Human-readable description supplied by the server
    #[serde(default)]
    pub error_description: Option<String>,
}

impl MaskinportenError {
    /// Returns the HTTP status when this is an [`MaskinportenError::UnexpectedResponse`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parses the OAuth2 error body of an unexpected response, if it has one.
    pub fn oauth_error(&self) -> Option<OAuthErrorBody> {
        match self {
            Self::UnexpectedResponse { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// Returns `true` when the token endpoint reported itself as temporarily
    /// unavailable.
    ///
    /// This is the one failure callers may reasonably retry: HTTP `503`, or
    /// any error response carrying the OAuth2 `temporarily_unavailable` code.
    pub fn is_temporarily_unavailable(&self) -> bool {
        match self {
            Self::UnexpectedResponse { status: 503, .. } => true,
            Self::UnexpectedResponse { .. } => self
                .oauth_error()
                .map(|e| e.error == "temporarily_unavailable")
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Result type alias for Maskinporten client operations
pub type Result<T> = std::result::Result<T, MaskinportenError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unexpected(status: u16, body: &str) -> MaskinportenError {
        MaskinportenError::UnexpectedResponse {
            status,
            reason: "Reason".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = MaskinportenError::Config("issuer is empty".to_string());
        assert_eq!(error.to_string(), "Configuration error: issuer is empty");
    }

    #[test]
    fn test_unexpected_response_display_contains_status_reason_and_body() {
        let error = MaskinportenError::UnexpectedResponse {
            status: 401,
            reason: "Unauthorized".to_string(),
            body: "{\"error\":\"invalid_client\"}".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("401"));
        assert!(s.contains("Unauthorized"));
        assert!(s.contains("invalid_client"));
    }

    #[test]
    fn test_status_only_for_unexpected_response() {
        assert_eq!(unexpected(404, "").status(), Some(404));
        assert_eq!(
            MaskinportenError::Config("x".to_string()).status(),
            None
        );
    }

    #[test]
    fn test_oauth_error_parsed_from_body() {
        let error = unexpected(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid assertion"}"#,
        );
        let body = error.oauth_error().expect("oauth error body");
        assert_eq!(body.error, "invalid_grant");
        assert_eq!(body.error_description.as_deref(), Some("Invalid assertion"));
    }

    #[test]
    fn test_oauth_error_none_for_plain_body() {
        assert!(unexpected(500, "Internal Server Error").oauth_error().is_none());
    }

    #[test]
    fn test_temporarily_unavailable_on_503() {
        assert!(unexpected(503, "").is_temporarily_unavailable());
    }

    #[test]
    fn test_temporarily_unavailable_from_oauth_error_code() {
        let error = unexpected(400, r#"{"error":"temporarily_unavailable"}"#);
        assert!(error.is_temporarily_unavailable());
    }

    #[test]
    fn test_other_failures_are_not_temporarily_unavailable() {
        assert!(!unexpected(500, "").is_temporarily_unavailable());
        assert!(!unexpected(400, r#"{"error":"invalid_grant"}"#).is_temporarily_unavailable());
        assert!(!MaskinportenError::Config("x".to_string()).is_temporarily_unavailable());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let error: MaskinportenError = json_error.into();
        assert!(matches!(error, MaskinportenError::Serialization(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing key");
        let error: MaskinportenError = io_error.into();
        assert!(matches!(error, MaskinportenError::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MaskinportenError>();
    }
}
