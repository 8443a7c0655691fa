//! Key material.
//!
//! Keys travel as lowercase hex: 32 bytes for the Ed25519 secret seed and 32
//! bytes for the public key. Parsing failures are configuration errors, never
//! verification results.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use crate::errors::{SealError, SealResult};

/// Source of key material for signing and verification.
///
/// Implementations must be shareable across worker threads; keys are only
/// ever read.
pub trait KeyProvider: Send + Sync {
    fn signing_key(&self) -> SealResult<SigningKey>;
    fn verifying_key(&self) -> SealResult<VerifyingKey>;
}

/// A signing key together with its public half.
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Secret seed as hex. The returned string is wiped on drop.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let mut bytes = self.signing_key.to_bytes();
        let out = Zeroizing::new(hex::encode(bytes));
        bytes.zeroize();
        out
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.verifying_key())
    }
}

/// Generate a fresh key pair from the OS CSPRNG.
pub fn generate_keypair() -> KeyPair {
    let mut csprng = OsRng;
    KeyPair::from_signing_key(SigningKey::generate(&mut csprng))
}

/// Short identifier for a public key: first 8 bytes of its SHA-256, hex.
pub fn fingerprint(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

/// Parse a hex-encoded 32-byte Ed25519 secret seed.
pub fn parse_signing_key(hex_str: &str) -> SealResult<SigningKey> {
    let mut bytes = decode_fixed::<SECRET_KEY_LENGTH>(hex_str.trim(), "private key")?;
    let key = SigningKey::from_bytes(&bytes);
    bytes.zeroize();
    Ok(key)
}

/// Parse a hex-encoded 32-byte Ed25519 public key.
pub fn parse_verifying_key(hex_str: &str) -> SealResult<VerifyingKey> {
    let bytes = decode_fixed::<PUBLIC_KEY_LENGTH>(hex_str.trim(), "public key")?;
    if bytes == [0u8; PUBLIC_KEY_LENGTH] {
        return Err(SealError::configuration("all-zero public key is not allowed"));
    }
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| SealError::configuration("public key is not a valid Ed25519 point"))
}

fn decode_fixed<const N: usize>(hex_str: &str, what: &str) -> SealResult<[u8; N]> {
    let mut raw = hex::decode(hex_str)
        .map_err(|_| SealError::configuration(format!("{what} is not valid hex")))?;
    let out: [u8; N] = raw.as_slice().try_into().map_err(|_| {
        SealError::configuration(format!(
            "{what} must be {N} bytes, got {}",
            raw.len()
        ))
    })?;
    raw.zeroize();
    Ok(out)
}

/// In-memory key provider. Missing halves report a configuration error.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    signing: Option<SigningKey>,
    verifying: Option<VerifyingKey>,
}

impl StaticKeys {
    pub fn new(signing: Option<SigningKey>, verifying: Option<VerifyingKey>) -> Self {
        Self { signing, verifying }
    }

    pub fn from_keypair(pair: &KeyPair) -> Self {
        Self {
            signing: Some(pair.signing_key().clone()),
            verifying: Some(pair.verifying_key()),
        }
    }

    pub fn verify_only(key: VerifyingKey) -> Self {
        Self {
            signing: None,
            verifying: Some(key),
        }
    }

    /// A provider with no key material at all.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl KeyProvider for StaticKeys {
    fn signing_key(&self) -> SealResult<SigningKey> {
        self.signing
            .clone()
            .ok_or_else(|| SealError::configuration("no private key configured"))
    }

    fn verifying_key(&self) -> SealResult<VerifyingKey> {
        self.verifying
            .ok_or_else(|| SealError::configuration("no public key configured"))
    }
}
