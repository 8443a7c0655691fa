use ed25519_dalek::{Signer, SigningKey};

use super::{signing_message, Token};
use crate::canonical::CanonicalText;
use crate::errors::{SealError, SealResult};

/// Sign canonical text. Ed25519 is deterministic: the same text and key
/// always produce the same token.
pub fn sign(canonical: &CanonicalText, key: &SigningKey) -> SealResult<Token> {
    let msg = signing_message(canonical);
    let sig = key
        .try_sign(&msg)
        .map_err(|e| SealError::signing(e.to_string()))?;
    Ok(Token::from_signature(&sig))
}
