//! RSA signing material
//!
//! A [`Signer`] wraps an RSA private key and produces RS256 signatures. The
//! matching public key is derived from the private key and exposed as a
//! jsonwebtoken [`DecodingKey`] so consumers and tests can verify what was
//! signed.
//!
//! [`SigningMaterial`] pairs a signer with the header data the token endpoint
//! uses to identify the key: either an X.509 certificate (sent as `x5c`) or
//! an optional key identifier (sent as `kid`). The two forms are variants of
//! one enum, so a configuration can never hold both or neither.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;

use crate::error::{MaskinportenError, Result};

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// RS256 signer backed by an RSA private key.
///
/// Key material is immutable after construction; a `Signer` can be shared
/// freely between concurrent callers.
#[derive(Clone)]
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key: RsaPublicKey,
}

impl Signer {
    /// Creates a signer from a PEM encoded RSA private key.
    ///
    /// Both PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`)
    /// encodings are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::KeyMaterial`] if the PEM does not contain
    /// a usable RSA private key.
    pub fn from_private_key_pem(pem: &str) -> Result<Self> {
        let key = match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(key) => key,
            Err(_) => RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| {
                MaskinportenError::KeyMaterial(format!("unable to parse RSA private key: {e}"))
            })?,
        };
        Self::from_rsa_private_key(key)
    }

    /// Creates a signer from an RSA JSON Web Key holding private parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::KeyMaterial`] if the key is not an RSA
    /// key, lacks private parameters, or its components are inconsistent.
    pub fn from_jwk(jwk: &RsaJwk) -> Result<Self> {
        if jwk.kty != "RSA" {
            return Err(MaskinportenError::KeyMaterial(format!(
                "unsupported JWK key type '{}', expected 'RSA'",
                jwk.kty
            )));
        }

        let n = jwk_component("n", Some(jwk.n.as_str()))?;
        let e = jwk_component("e", Some(jwk.e.as_str()))?;
        let d = jwk_component("d", jwk.d.as_deref())?;
        let p = jwk_component("p", jwk.p.as_deref())?;
        let q = jwk_component("q", jwk.q.as_deref())?;

        let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| MaskinportenError::KeyMaterial(format!("invalid RSA JWK: {e}")))?;
        Self::from_rsa_private_key(key)
    }

    fn from_rsa_private_key(mut key: RsaPrivateKey) -> Result<Self> {
        key.validate()
            .map_err(|e| MaskinportenError::KeyMaterial(format!("invalid RSA private key: {e}")))?;
        key.precompute()
            .map_err(|e| MaskinportenError::KeyMaterial(format!("invalid RSA private key: {e}")))?;

        let der = key.to_pkcs1_der().map_err(|e| {
            MaskinportenError::KeyMaterial(format!("unable to encode RSA private key: {e}"))
        })?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let public_key = RsaPublicKey::from(&key);
        let decoding_key = DecodingKey::from_rsa_components(
            &URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            &URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        )?;

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key,
        })
    }

    /// Signs `message` with RSASSA-PKCS1-v1_5 / SHA-256.
    ///
    /// Returns the signature base64url encoded without padding, ready to be
    /// used as the third segment of a compact JWT.
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        Ok(jsonwebtoken::crypto::sign(
            message,
            &self.encoding_key,
            Algorithm::RS256,
        )?)
    }

    /// Verifies a base64url signature produced by [`Signer::sign`].
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<bool> {
        Ok(jsonwebtoken::crypto::verify(
            signature,
            message,
            &self.decoding_key,
            Algorithm::RS256,
        )?)
    }

    /// Key used by jsonwebtoken to sign.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Public half of the key, for verifying signatures.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Public key as an RSA value.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Public key as a SubjectPublicKeyInfo PEM document.
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| MaskinportenError::KeyMaterial(format!("unable to encode public key: {e}")))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &Algorithm::RS256)
            .field("modulus_bits", &(self.public_key.size() * 8))
            .finish_non_exhaustive()
    }
}

fn jwk_component(name: &str, value: Option<&str>) -> Result<BigUint> {
    let value = value.ok_or_else(|| {
        MaskinportenError::KeyMaterial(format!("JWK is missing the '{name}' parameter"))
    })?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| MaskinportenError::KeyMaterial(format!("JWK parameter '{name}': {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey> {
    match RsaPublicKey::from_public_key_pem(pem) {
        Ok(key) => Ok(key),
        Err(_) => RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| {
            MaskinportenError::KeyMaterial(format!("unable to parse RSA public key: {e}"))
        }),
    }
}

// ---------------------------------------------------------------------------
// RsaJwk
// ---------------------------------------------------------------------------

/// An RSA JSON Web Key (RFC 7517) including the private parameters.
///
/// Only the parameters needed to rebuild the key are read; CRT parameters
/// (`dp`, `dq`, `qi`) are recomputed.
#[derive(Debug, Clone, Deserialize)]
pub struct RsaJwk {
    /// Key type, must be `RSA`.
    pub kty: String,

    /// Key identifier, sent as the `kid` assertion header.
    #[serde(default)]
    pub kid: Option<String>,

    /// Modulus.
    pub n: String,

    /// Public exponent.
    pub e: String,

    /// Private exponent.
    #[serde(default)]
    pub d: Option<String>,

    /// First prime factor.
    #[serde(default)]
    pub p: Option<String>,

    /// Second prime factor.
    #[serde(default)]
    pub q: Option<String>,
}

impl RsaJwk {
    /// Parses a JWK from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// A DER encoded X.509 certificate identifying the signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    const PEM_BEGIN: &'static str = "-----BEGIN CERTIFICATE-----";
    const PEM_END: &'static str = "-----END CERTIFICATE-----";

    /// Wraps DER bytes.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { der: der.into() }
    }

    /// Reads the first certificate of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::KeyMaterial`] when no certificate block
    /// is present or its body is not valid base64.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let start = pem.find(Self::PEM_BEGIN).ok_or_else(|| {
            MaskinportenError::KeyMaterial("no PEM certificate block found".to_string())
        })? + Self::PEM_BEGIN.len();
        let end = pem[start..].find(Self::PEM_END).ok_or_else(|| {
            MaskinportenError::KeyMaterial("unterminated PEM certificate block".to_string())
        })? + start;

        let body: String = pem[start..end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let der = STANDARD
            .decode(body)
            .map_err(|e| MaskinportenError::KeyMaterial(format!("invalid certificate PEM: {e}")))?;
        if der.is_empty() {
            return Err(MaskinportenError::KeyMaterial(
                "empty certificate".to_string(),
            ));
        }

        Ok(Self { der })
    }

    /// Raw DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Standard base64 of the DER bytes, as carried in the `x5c` header.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }
}

// ---------------------------------------------------------------------------
// SigningMaterial
// ---------------------------------------------------------------------------

/// The key used to sign assertions together with how it is identified.
#[derive(Debug, Clone)]
pub enum SigningMaterial {
    /// Business certificate; the certificate is sent in the `x5c` header.
    Certificate {
        /// Certificate matching the private key.
        certificate: Certificate,
        /// Signer for the certificate's private key.
        signer: Arc<Signer>,
    },

    /// Raw RSA key pair registered with the token endpoint; identified by
    /// `kid` when a key identifier is configured.
    KeyPair {
        /// Signer for the private key.
        signer: Arc<Signer>,
        /// Identifier sent as the `kid` header.
        key_id: Option<String>,
    },
}

impl SigningMaterial {
    /// Certificate-backed material from PEM text.
    pub fn certificate(certificate_pem: &str, private_key_pem: &str) -> Result<Self> {
        Ok(Self::Certificate {
            certificate: Certificate::from_pem(certificate_pem)?,
            signer: Arc::new(Signer::from_private_key_pem(private_key_pem)?),
        })
    }

    /// Certificate-backed material from DER certificate bytes.
    pub fn certificate_der(certificate_der: impl Into<Vec<u8>>, private_key_pem: &str) -> Result<Self> {
        Ok(Self::Certificate {
            certificate: Certificate::from_der(certificate_der),
            signer: Arc::new(Signer::from_private_key_pem(private_key_pem)?),
        })
    }

    /// Explicit public/private key pair.
    ///
    /// # Errors
    ///
    /// Returns [`MaskinportenError::KeyMaterial`] if either key cannot be
    /// parsed or the public key does not belong to the private key.
    pub fn key_pair(
        public_key_pem: &str,
        private_key_pem: &str,
        key_id: Option<String>,
    ) -> Result<Self> {
        let signer = Signer::from_private_key_pem(private_key_pem)?;
        let public_key = parse_public_key_pem(public_key_pem)?;
        if &public_key != signer.public_key() {
            return Err(MaskinportenError::KeyMaterial(
                "public key does not match private key".to_string(),
            ));
        }

        Ok(Self::KeyPair {
            signer: Arc::new(signer),
            key_id,
        })
    }

    /// Key pair whose public half is derived from the private key.
    pub fn private_key(private_key_pem: &str, key_id: Option<String>) -> Result<Self> {
        Ok(Self::KeyPair {
            signer: Arc::new(Signer::from_private_key_pem(private_key_pem)?),
            key_id,
        })
    }

    /// Key pair from an RSA JWK; the JWK's `kid` becomes the key identifier.
    pub fn jwk(jwk: &RsaJwk) -> Result<Self> {
        Ok(Self::KeyPair {
            signer: Arc::new(Signer::from_jwk(jwk)?),
            key_id: jwk.kid.clone(),
        })
    }

    /// The signer for this material.
    pub fn signer(&self) -> &Signer {
        match self {
            Self::Certificate { signer, .. } | Self::KeyPair { signer, .. } => signer,
        }
    }

    /// Key identifier, only for key-pair material.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::Certificate { .. } => None,
            Self::KeyPair { key_id, .. } => key_id.as_deref(),
        }
    }

    /// Certificate, only for certificate material.
    pub fn as_certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Certificate { certificate, .. } => Some(certificate),
            Self::KeyPair { .. } => None,
        }
    }
}
