//! Token endpoint exchange
//!
//! One call to [`TokenEndpointClient::exchange`] is one `POST` of a signed
//! assertion to the token endpoint. There is no retry at this layer.

use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{MaskinportenError, Result};

/// Grant type of the JWT-bearer flow (RFC 7523).
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Name of the header carrying the consumer organization.
pub const CONSUMER_ORG_HEADER: &str = "consumer_org";

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// The access token, usually itself a JWT
    pub access_token: String,

    /// Lifetime of the token in seconds
    pub expires_in: u64,

    /// Token type, typically `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,

    /// Scopes granted
    #[serde(default)]
    pub scope: Option<String>,
}

/// HTTP client for a single token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpointClient {
    http: Client,
    token_endpoint: Url,
}

impl TokenEndpointClient {
    /// Creates a client posting to `token_endpoint` through `http`.
    ///
    /// `http` should be built without redirect following so that 3xx
    /// answers are reported instead of followed.
    pub fn new(http: Client, token_endpoint: Url) -> Self {
        Self {
            http,
            token_endpoint,
        }
    }

    /// The endpoint URL.
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// Exchanges `assertion` for an access token.
    ///
    /// # Arguments
    ///
    /// * `assertion` - Signed compact JWT
    /// * `consumer_org` - Sent as the `consumer_org` header when present
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::UnexpectedResponse`] for any status
    /// other than `200 OK`, [`MaskinportenError::InvalidResponse`] when a
    /// `200` body is not a token response, and [`MaskinportenError::Http`]
    /// for transport failures.
    pub async fn exchange(
        &self,
        assertion: &str,
        consumer_org: Option<&str>,
    ) -> Result<TokenResponse> {
        let params = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion)];

        let mut request = self
            .http
            .post(self.token_endpoint.clone())
            .header("Charset", "utf-8")
            .header(CACHE_CONTROL, "no-cache")
            .form(&params);
        if let Some(consumer_org) = consumer_org {
            request = request.header(CONSUMER_ORG_HEADER, consumer_org);
        }

        debug!(endpoint = %self.token_endpoint, "Requesting access token");
        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                "Token endpoint returned unexpected response: {}", body
            );
            return Err(MaskinportenError::UnexpectedResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            MaskinportenError::InvalidResponse(format!("failed to parse token response: {e}"))
        })
    }
}
