//! Signing and verification of canonical unit text.
//!
//! - Ed25519 over a domain-separated message: `<domain>\n<canonical text>`
//! - tokens are the lowercase hex of the 64-byte signature, so they are always
//!   legal identifier characters after the `_` prefix
//! - key material comes from a [`KeyProvider`]; the core never reads the
//!   environment or disk for keys

pub mod keys;
pub mod sign;
pub mod verify;

pub use ed25519_dalek::{SigningKey, VerifyingKey};
pub use keys::{generate_keypair, KeyPair, KeyProvider, StaticKeys};
pub use sign::sign;
pub use verify::{verify, Verdict};

use crate::canonical::CanonicalText;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 secret key length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Hex length of an encoded token.
pub const TOKEN_HEX_LENGTH: usize = SIGNATURE_LENGTH * 2;

/// Embeddable signature payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn from_signature(sig: &ed25519_dalek::Signature) -> Self {
        Self(hex::encode(sig.to_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes actually signed for a canonical text.
pub fn signing_message(canonical: &CanonicalText) -> Vec<u8> {
    let domain = canonical.version().signing_domain();
    let mut buf = Vec::with_capacity(domain.len() + 1 + canonical.as_bytes().len());
    buf.extend_from_slice(domain.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(canonical.as_bytes());
    buf
}
