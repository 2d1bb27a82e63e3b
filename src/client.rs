//! Maskinporten client
//!
//! [`MaskinportenClient`] ties the pieces together: every public method turns
//! its arguments into a [`TokenRequest`] and hands it to
//! [`MaskinportenClient::get_token`], which serves it from the cache or signs
//! a new assertion and exchanges it at the token endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::{debug, info};

use crate::cache::TokenCache;
use crate::clock::{Clock, SystemClock};
use crate::configuration::ClientConfiguration;
use crate::endpoint::TokenEndpointClient;
use crate::error::Result;
use crate::jwt::assertion::AssertionBuilder;
use crate::request::{IntoScopes, TokenRequest};
use crate::token::MaskinportenToken;

/// Source of access tokens.
///
/// Implemented by [`MaskinportenClient`]; code that only needs tokens can
/// depend on `Arc<dyn AccessTokenProvider>` and be tested with a stub.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a valid token for `request`.
    async fn get_token(&self, request: &TokenRequest) -> Result<MaskinportenToken>;
}

/// Client for a Maskinporten token endpoint.
///
/// Cloning is cheap; clones share the token cache.
///
/// # Examples
///
/// ```no_run
/// use maskinporten_client::{ClientConfiguration, Environment, MaskinportenClient, SigningMaterial};
///
/// # async fn example() -> maskinporten_client::Result<()> {
/// let key_pem = std::fs::read_to_string("key.pem")?;
/// let signing = SigningMaterial::private_key(&key_pem, Some("my-kid".to_string()))?;
/// let configuration = ClientConfiguration::new(Environment::Test, "my-client-id", signing)?;
///
/// let client = MaskinportenClient::new(configuration)?;
/// let token = client.get_access_token(["ks:fiks", "ks:other"]).await?;
/// println!("{}", token.bearer_header());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MaskinportenClient {
    configuration: Arc<ClientConfiguration>,
    assertions: AssertionBuilder,
    endpoint: TokenEndpointClient,
    cache: Arc<TokenCache<TokenRequest, MaskinportenToken>>,
    clock: Arc<dyn Clock>,
}

impl MaskinportenClient {
    /// Creates a client with the system clock and a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MaskinportenError::Http`] if the HTTP client cannot
    /// be built.
    pub fn new(configuration: ClientConfiguration) -> Result<Self> {
        Self::builder(configuration).build()
    }

    /// Starts a [`MaskinportenClientBuilder`].
    pub fn builder(configuration: ClientConfiguration) -> MaskinportenClientBuilder {
        MaskinportenClientBuilder {
            configuration,
            http_client: None,
            clock: None,
        }
    }

    /// The configuration this client was built with.
    pub fn configuration(&self) -> &ClientConfiguration {
        &self.configuration
    }

    /// Token for the client's own organization.
    pub async fn get_access_token(&self, scopes: impl IntoScopes) -> Result<MaskinportenToken> {
        self.get_token(&TokenRequest::new(scopes)).await
    }

    /// Token delegated to `consumer_org`.
    ///
    /// The organization is sent both as the `consumer_org` claim and as the
    /// `consumer_org` header.
    pub async fn get_delegated_access_token(
        &self,
        consumer_org: impl Into<String>,
        scopes: impl IntoScopes,
    ) -> Result<MaskinportenToken> {
        let request = TokenRequest::builder()
            .with_scopes(scopes)
            .with_consumer_org(consumer_org)
            .build();
        self.get_token(&request).await
    }

    /// Token delegated to `consumer_org` and restricted to `audience`.
    pub async fn get_delegated_access_token_for_audience(
        &self,
        consumer_org: impl Into<String>,
        audience: impl Into<String>,
        scopes: impl IntoScopes,
    ) -> Result<MaskinportenToken> {
        let request = TokenRequest::builder()
            .with_scopes(scopes)
            .with_consumer_org(consumer_org)
            .with_audience(audience)
            .build();
        self.get_token(&request).await
    }

    /// Token issued on behalf of `on_behalf_of` (`iss_onbehalfof` claim).
    pub async fn get_on_behalf_of_access_token(
        &self,
        on_behalf_of: impl Into<String>,
        scopes: impl IntoScopes,
    ) -> Result<MaskinportenToken> {
        let request = TokenRequest::builder()
            .with_scopes(scopes)
            .with_on_behalf_of(on_behalf_of)
            .build();
        self.get_token(&request).await
    }

    /// Returns a cached token for `request`, or obtains a new one.
    ///
    /// Concurrent calls for an equal request share a single exchange.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MaskinportenError::UnexpectedResponse`] when the
    /// token endpoint does not answer `200 OK`, and transport or signing
    /// errors as they occur. Failures are never cached.
    pub async fn get_token(&self, request: &TokenRequest) -> Result<MaskinportenToken> {
        debug!(scopes = %request.scopes(), "Access token requested");
        self.cache
            .get_token(request, || self.request_new_token(request))
            .await
    }

    /// Signs an assertion for `request` without contacting the endpoint.
    pub fn assertion(&self, request: &TokenRequest) -> Result<String> {
        self.assertions.build(request)
    }

    async fn request_new_token(&self, request: &TokenRequest) -> Result<MaskinportenToken> {
        let assertion = self.assertions.build(request)?;
        let consumer_org = self.assertions.effective_consumer_org(request);
        let response = self.endpoint.exchange(&assertion, consumer_org).await?;

        info!(
            scopes = %request.scopes(),
            expires_in = response.expires_in,
            "Obtained new access token"
        );
        Ok(MaskinportenToken::from_response(
            response.access_token,
            response.expires_in,
            self.configuration.safety_margin(),
            self.clock.now(),
        ))
    }
}

#[async_trait]
impl AccessTokenProvider for MaskinportenClient {
    async fn get_token(&self, request: &TokenRequest) -> Result<MaskinportenToken> {
        MaskinportenClient::get_token(self, request).await
    }
}

/// Builder for [`MaskinportenClient`] with injectable collaborators.
#[derive(Debug)]
pub struct MaskinportenClientBuilder {
    configuration: ClientConfiguration,
    http_client: Option<reqwest::Client>,
    clock: Option<Arc<dyn Clock>>,
}

impl MaskinportenClientBuilder {
    /// Uses `http_client` for token exchanges.
    ///
    /// The client's own redirect and timeout settings then apply instead of
    /// the configured request timeout.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Uses `clock` for assertion timestamps and token expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the client.
    ///
    /// Without an explicit HTTP client, one is built that does not follow
    /// redirects and times out after the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MaskinportenError::Http`] if the default HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<MaskinportenClient> {
        let http = match self.http_client {
            Some(http) => http,
            None => reqwest::Client::builder()
                .redirect(Policy::none())
                .timeout(self.configuration.request_timeout())
                .build()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let configuration = Arc::new(self.configuration);

        Ok(MaskinportenClient {
            assertions: AssertionBuilder::new(Arc::clone(&configuration), Arc::clone(&clock)),
            endpoint: TokenEndpointClient::new(http, configuration.token_endpoint().clone()),
            cache: Arc::new(TokenCache::new(Arc::clone(&clock))),
            configuration,
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::assertion::AssertionClaims;
    use crate::test_utils::{access_token_jwt, test_configuration, wiremock_configuration};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_builds_with_defaults() {
        let client = MaskinportenClient::new(test_configuration()).unwrap();
        assert_eq!(client.configuration().issuer(), "test-client");
        assert!(client.cache.is_empty());
    }

    #[test]
    fn test_assertion_is_signed_with_configured_key() {
        let client = MaskinportenClient::new(test_configuration()).unwrap();
        let request = TokenRequest::new("ks:fiks");

        let assertion = client.assertion(&request).unwrap();
        let key = client.configuration().signing().signer().decoding_key();
        let (header, claims): (_, AssertionClaims) =
            crate::jwt::codec::decode(&assertion, key).unwrap();

        assert_eq!(header.kid.as_deref(), Some("test-kid"));
        assert_eq!(claims.scope, "ks:fiks");
        assert_eq!(claims.aud, client.configuration().audience());
    }

    #[tokio::test]
    async fn test_client_is_usable_as_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": access_token_jwt(&serde_json::json!({"scope": "ks:fiks"})),
                "expires_in": 120
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MaskinportenClient::new(wiremock_configuration(&server.uri())).unwrap();
        let provider: Arc<dyn AccessTokenProvider> = Arc::new(client.clone());

        let from_provider = provider.get_token(&TokenRequest::new("ks:fiks")).await.unwrap();
        let from_client = client.get_access_token("ks:fiks").await.unwrap();

        assert_eq!(from_provider, from_client);
        assert_eq!(from_client.claims().scope.as_deref(), Some("ks:fiks"));
        assert_eq!(client.cache.len(), 1);
    }
}
