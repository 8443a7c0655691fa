//! Verification of embedded tokens.
//!
//! A signature that does not match is a normal outcome reported through
//! [`Verdict`]. Errors are reserved for tokens that cannot be decoded at all.

use ed25519_dalek::{Signature, VerifyingKey};

use super::{signing_message, SIGNATURE_LENGTH, TOKEN_HEX_LENGTH};
use crate::canonical::CanonicalText;
use crate::errors::{SealError, SealResult};

pub const MSG_VALID: &str = "Signature valid - code has not been tampered with";
pub const MSG_INVALID: &str = "Signature invalid - code may have been modified";

/// Outcome of checking one token against one canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    pub message: String,
}

/// Verify `token` over `canonical` with `key`.
pub fn verify(canonical: &CanonicalText, token: &str, key: &VerifyingKey) -> SealResult<Verdict> {
    let sig = decode_token(token)?;
    let msg = signing_message(canonical);

    let verdict = match key.verify_strict(&msg, &sig) {
        Ok(()) => Verdict {
            valid: true,
            message: MSG_VALID.to_string(),
        },
        Err(_) => Verdict {
            valid: false,
            message: MSG_INVALID.to_string(),
        },
    };
    Ok(verdict)
}

fn decode_token(token: &str) -> SealResult<Signature> {
    if token.len() != TOKEN_HEX_LENGTH {
        return Err(SealError::verification(format!(
            "malformed token: expected {TOKEN_HEX_LENGTH} hex characters, got {}",
            token.len()
        )));
    }
    let bytes = hex::decode(token)
        .map_err(|e| SealError::verification(format!("malformed token: {e}")))?;
    let arr: [u8; SIGNATURE_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SealError::verification("malformed token: wrong signature length"))?;
    Ok(Signature::from_bytes(&arr))
}
