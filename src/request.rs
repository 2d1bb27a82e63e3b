//! Token request value type
//!
//! A [`TokenRequest`] identifies the shape of the token being asked for:
//! the scopes plus the optional delegation, audience and end-user
//! restrictions. It is also the cache key, so equality is exact and covers
//! every field.

use serde::{Deserialize, Serialize};

/// Conversion into the single space-separated scope string sent to the
/// token endpoint.
///
/// A plain string is used as-is; any list of strings is joined with a single
/// space.
///
/// # Examples
///
/// ```
/// use maskinporten_client::request::IntoScopes;
///
/// assert_eq!("ks:fiks".into_scopes(), "ks:fiks");
/// assert_eq!(["ks:fiks", "ks:other"].into_scopes(), "ks:fiks ks:other");
/// assert_eq!(vec!["a".to_string(), "b".to_string()].into_scopes(), "a b");
/// ```
pub trait IntoScopes {
    /// Returns the joined scope string.
    fn into_scopes(self) -> String;
}

impl IntoScopes for &str {
    fn into_scopes(self) -> String {
        self.to_string()
    }
}

impl IntoScopes for String {
    fn into_scopes(self) -> String {
        self
    }
}

impl IntoScopes for &String {
    fn into_scopes(self) -> String {
        self.clone()
    }
}

impl<T: AsRef<str>> IntoScopes for &[T] {
    fn into_scopes(self) -> String {
        join_scopes(self)
    }
}

impl<T: AsRef<str>> IntoScopes for Vec<T> {
    fn into_scopes(self) -> String {
        join_scopes(&self)
    }
}

impl<T: AsRef<str>> IntoScopes for &Vec<T> {
    fn into_scopes(self) -> String {
        join_scopes(self)
    }
}

impl<T: AsRef<str>, const N: usize> IntoScopes for [T; N] {
    fn into_scopes(self) -> String {
        join_scopes(&self)
    }
}

fn join_scopes<T: AsRef<str>>(scopes: &[T]) -> String {
    scopes
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The parameters of one access token request.
///
/// # Examples
///
/// ```
/// use maskinporten_client::TokenRequest;
///
/// let request = TokenRequest::builder()
///     .with_scopes(["ks:fiks", "ks:other"])
///     .with_consumer_org("999888777")
///     .build();
///
/// assert_eq!(request.scopes(), "ks:fiks ks:other");
/// assert_eq!(request.consumer_org(), Some("999888777"));
/// assert_eq!(request.audience(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRequest {
    scopes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    consumer_org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_behalf_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pid: Option<String>,
}

impl TokenRequest {
    /// Creates a request for the given scopes with no restrictions.
    pub fn new(scopes: impl IntoScopes) -> Self {
        Self {
            scopes: scopes.into_scopes(),
            ..Self::default()
        }
    }

    /// Starts a [`TokenRequestBuilder`].
    pub fn builder() -> TokenRequestBuilder {
        TokenRequestBuilder::default()
    }

    /// Space-separated scopes.
    pub fn scopes(&self) -> &str {
        &self.scopes
    }

    /// Organization number on whose behalf a delegated token is requested.
    pub fn consumer_org(&self) -> Option<&str> {
        self.consumer_org.as_deref()
    }

    /// Value of the `iss_onbehalfof` claim.
    pub fn on_behalf_of(&self) -> Option<&str> {
        self.on_behalf_of.as_deref()
    }

    /// Resource the token should be restricted to (`resource` claim).
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// Person identifier for end-user restricted tokens (`pid` claim).
    ///
    /// An eleven-digit national identity number.
    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }
}

/// Fluent builder for [`TokenRequest`].
#[derive(Debug, Clone, Default)]
pub struct TokenRequestBuilder {
    request: TokenRequest,
}

impl TokenRequestBuilder {
    /// Sets the scopes, joining lists with a single space.
    pub fn with_scopes(mut self, scopes: impl IntoScopes) -> Self {
        self.request.scopes = scopes.into_scopes();
        self
    }

    /// Sets the consumer organization for delegated access.
    pub fn with_consumer_org(mut self, consumer_org: impl Into<String>) -> Self {
        self.request.consumer_org = Some(consumer_org.into());
        self
    }

    /// Sets the `iss_onbehalfof` value.
    pub fn with_on_behalf_of(mut self, on_behalf_of: impl Into<String>) -> Self {
        self.request.on_behalf_of = Some(on_behalf_of.into());
        self
    }

    /// Restricts the token to a resource audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.request.audience = Some(audience.into());
        self
    }

    /// Restricts the token to an end user.
    pub fn with_pid(mut self, pid: impl Into<String>) -> Self {
        self.request.pid = Some(pid.into());
        self
    }

    /// Returns the finished request.
    pub fn build(self) -> TokenRequest {
        self.request
    }
}
