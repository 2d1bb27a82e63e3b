//! JWT handling: signing keys, compact encoding and assertion building

pub mod assertion;
pub mod codec;
pub mod signer;

pub use assertion::{AssertionBuilder, AssertionClaims, ASSERTION_LIFETIME_SECS};
pub use codec::{decode, decode_payload_unverified, encode};
pub use signer::{Certificate, RsaJwk, Signer, SigningMaterial};
