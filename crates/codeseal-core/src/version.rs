//! Version helpers.
//!
//! The canonical rendering is a contract: a signature issued under one
//! rendering version only verifies under the same version.

/// Known canonical rendering versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalVersion {
    V1,
}

impl CanonicalVersion {
    /// The version used for newly issued signatures.
    pub const CURRENT: Self = Self::V1;

    /// Return the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "canon/v1",
        }
    }

    /// Domain separation label mixed into every signed message.
    pub fn signing_domain(&self) -> &'static str {
        match self {
            Self::V1 => crate::domain::UNIT_V1,
        }
    }
}
