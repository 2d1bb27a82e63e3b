//! Shared helpers for token endpoint integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header};
use serde_json::{json, Map, Value};
use wiremock::{Match, MockServer, Request, Respond, ResponseTemplate};

use maskinporten_client::clock::Clock;
use maskinporten_client::jwt::codec;
use maskinporten_client::jwt::signer::Signer;
use maskinporten_client::{
    ClientConfiguration, Environment, MaskinportenClient, SigningMaterial,
};

#[allow(dead_code)]
pub const CLIENT_KEY_PEM: &str = include_str!("../fixtures/client_key.pem");
#[allow(dead_code)]
pub const CLIENT_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/client_public.pem");
#[allow(dead_code)]
pub const CLIENT_CERT_PEM: &str = include_str!("../fixtures/client_cert.pem");
#[allow(dead_code)]
pub const CLIENT_JWK_JSON: &str = include_str!("../fixtures/client_jwk.json");
#[allow(dead_code)]
pub const ISSUER_KEY_PEM: &str = include_str!("../fixtures/other_key.pem");

#[allow(dead_code)]
pub const ISSUER: &str = "test-client";
#[allow(dead_code)]
pub const KEY_ID: &str = "test-kid";

/// Key-pair signing material for the test client
#[allow(dead_code)]
pub fn key_pair_material() -> SigningMaterial {
    SigningMaterial::key_pair(CLIENT_PUBLIC_KEY_PEM, CLIENT_KEY_PEM, Some(KEY_ID.to_string()))
        .expect("fixture key pair")
}

/// Configuration whose audience and token endpoint point at `server`
#[allow(dead_code)]
pub fn configuration_for(server: &MockServer, signing: SigningMaterial) -> ClientConfiguration {
    let environment = Environment::custom(
        format!("{}/", server.uri()),
        format!("{}/token", server.uri()),
    );
    ClientConfiguration::new(environment, ISSUER, signing).expect("configuration")
}

/// Client for `server` using key-pair material and the system clock
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> MaskinportenClient {
    MaskinportenClient::new(configuration_for(server, key_pair_material())).expect("client")
}

/// Client for `server` reading time from `clock`
#[allow(dead_code)]
pub fn client_with_clock(server: &MockServer, clock: Arc<dyn Clock>) -> MaskinportenClient {
    MaskinportenClient::builder(configuration_for(server, key_pair_material()))
        .clock(clock)
        .build()
        .expect("client")
}

/// Signer standing in for the token endpoint's own key
pub fn issuer_signer() -> Signer {
    Signer::from_private_key_pem(ISSUER_KEY_PEM).expect("issuer key")
}

/// Fabricates an access token the way the token endpoint would
pub fn access_token_jwt(claims: &Value) -> String {
    codec::encode(&Header::new(Algorithm::RS256), claims, &issuer_signer()).expect("access token")
}

/// Claims of a typical access token with the given `jti`
pub fn access_token_claims(jti: &str, expires_in: i64) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "aud": "unspecified",
        "scope": "ks:fiks",
        "iss": "https://test.maskinporten.no/",
        "token_type": "Bearer",
        "exp": now + expires_in,
        "iat": now,
        "client_orgno": "987654321",
        "jti": jti,
        "consumer": { "authority": "iso6523-actorid-upis", "ID": "0192:987654321" }
    })
}

/// A `200 OK` token response
pub fn token_response(access_token: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "ks:fiks"
    }))
}

/// Responds with a new access token on every request; the n-th token has
/// `jti` `token-n`.
#[allow(dead_code)]
pub struct SequentialTokens {
    issued: AtomicUsize,
    expires_in: u64,
}

#[allow(dead_code)]
impl SequentialTokens {
    pub fn new(expires_in: u64) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            expires_in,
        }
    }
}

impl Respond for SequentialTokens {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let claims = access_token_claims(&format!("token-{n}"), self.expires_in as i64);
        token_response(&access_token_jwt(&claims), self.expires_in)
    }
}

/// Extracts the `assertion` form field of a token request
pub fn assertion_of(request: &Request) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(name, _)| name == "assertion")
        .map(|(_, value)| value.into_owned())
}

/// Claims of the assertion in a token request, read without verification
pub fn assertion_claims_of(request: &Request) -> Option<Map<String, Value>> {
    assertion_of(request).and_then(|a| codec::decode_payload_unverified(&a).ok())
}

/// Matches token requests whose assertion has claim `name` equal to `value`
#[allow(dead_code)]
pub struct AssertionClaimEquals {
    name: String,
    value: Value,
}

#[allow(dead_code)]
pub fn assertion_claim(name: &str, value: impl Into<Value>) -> AssertionClaimEquals {
    AssertionClaimEquals {
        name: name.to_string(),
        value: value.into(),
    }
}

impl Match for AssertionClaimEquals {
    fn matches(&self, request: &Request) -> bool {
        assertion_claims_of(request)
            .and_then(|claims| claims.get(&self.name).cloned())
            .is_some_and(|claim| claim == self.value)
    }
}

/// Matches token requests whose assertion lacks claim `name`
#[allow(dead_code)]
pub struct AssertionClaimAbsent(pub &'static str);

impl Match for AssertionClaimAbsent {
    fn matches(&self, request: &Request) -> bool {
        assertion_claims_of(request).is_some_and(|claims| !claims.contains_key(self.0))
    }
}

/// Assertions of every request the server has received so far
#[allow(dead_code)]
pub async fn received_assertions(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(assertion_of)
        .collect()
}
