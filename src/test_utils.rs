//! Test utilities for the Maskinporten client
//!
//! Fixture keys, ready-made configurations and a helper for fabricating
//! access tokens the way the token endpoint would issue them.

use crate::configuration::{ClientConfiguration, Environment};
use crate::error::Result;
use crate::jwt::signer::{Signer, SigningMaterial};
use jsonwebtoken::{Algorithm, Header};
use std::path::PathBuf;
use tempfile::TempDir;

/// PKCS#8 private key of the test client
pub fn client_key_pem() -> &'static str {
    include_str!("../tests/fixtures/client_key.pem")
}

/// SubjectPublicKeyInfo public key matching [`client_key_pem`]
pub fn client_public_key_pem() -> &'static str {
    include_str!("../tests/fixtures/client_public.pem")
}

/// Self-signed certificate for [`client_key_pem`]
pub fn client_cert_pem() -> &'static str {
    include_str!("../tests/fixtures/client_cert.pem")
}

/// [`client_key_pem`] as an RSA JWK with `kid` `test-key-1`
pub fn client_jwk_json() -> &'static str {
    include_str!("../tests/fixtures/client_jwk.json")
}

/// An unrelated key, used as the token issuer's key
pub fn other_key_pem() -> &'static str {
    include_str!("../tests/fixtures/other_key.pem")
}

/// Key-pair signing material with key id `test-kid`
///
/// # Panics
///
/// Panics if the fixture keys cannot be parsed
pub fn test_signing_material() -> SigningMaterial {
    SigningMaterial::key_pair(
        client_public_key_pem(),
        client_key_pem(),
        Some("test-kid".to_string()),
    )
    .expect("fixture key pair")
}

/// Configuration for the test environment with issuer `test-client`
pub fn test_configuration() -> ClientConfiguration {
    ClientConfiguration::new(Environment::Test, "test-client", test_signing_material())
        .expect("test configuration")
}

/// Configuration pointing at a mock server's `/token`
///
/// # Arguments
///
/// * `base_uri` - Base URI of the mock server, without trailing slash
pub fn wiremock_configuration(base_uri: &str) -> ClientConfiguration {
    let environment = Environment::custom(format!("{base_uri}/"), format!("{base_uri}/token"));
    ClientConfiguration::new(environment, "test-client", test_signing_material())
        .expect("wiremock configuration")
}

/// Signer standing in for the token endpoint's own key
pub fn issuer_signer() -> Signer {
    Signer::from_private_key_pem(other_key_pem()).expect("issuer key")
}

/// Fabricates an access token carrying `claims`, signed by [`issuer_signer`]
pub fn access_token_jwt(claims: &serde_json::Value) -> String {
    crate::jwt::codec::encode(&Header::new(Algorithm::RS256), claims, &issuer_signer())
        .expect("access token")
}

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaskinportenError;

    #[test]
    fn test_fixture_configuration_is_valid() {
        let config = test_configuration();
        assert_eq!(config.issuer(), "test-client");
        assert_eq!(config.key_id(), Some("test-kid"));
    }

    #[test]
    fn test_wiremock_configuration_targets_token_path() {
        let config = wiremock_configuration("http://127.0.0.1:9999");
        assert_eq!(config.token_endpoint().as_str(), "http://127.0.0.1:9999/token");
        assert_eq!(config.audience(), "http://127.0.0.1:9999/");
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(MaskinportenError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: Result<()> = Err(MaskinportenError::Config("different error".to_string()));
        assert_error_contains(result, "not present");
    }
}
