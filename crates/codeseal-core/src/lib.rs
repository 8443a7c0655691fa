//! codeseal-core
//!
//! Core primitives for codeseal:
//! - Definition unit extraction from Python sources (tree-sitter)
//! - Canonical serialization of a unit (`canon/v1`)
//! - Ed25519 signing and verification with domain separation
//! - Annotation rewriting: decorate, check, remove
//! - Folder batches with per-file error isolation

pub mod annotation;
pub mod batch;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod fsio;
pub mod rewrite;
pub mod version;

pub use crate::errors::{SealError, SealResult};

/// Domain separation labels for signed messages.
/// These must remain stable across versions.
pub mod domain {
    pub const UNIT_V1: &str = "codeseal.v1.unit";
}

/// Default settings shared by the library and the CLI.
pub mod defaults {
    /// Namespace of injected annotations.
    pub const NAMESPACE: &str = "codeseal";
    /// Environment file read and written by the CLI.
    pub const ENV_FILE: &str = ".env";
    /// Environment variable holding the hex-encoded signing key.
    pub const PRIVATE_KEY_VAR: &str = "CODESEAL_PRIVATE_KEY";
    /// Environment variable holding the hex-encoded verifying key.
    pub const PUBLIC_KEY_VAR: &str = "CODESEAL_PUBLIC_KEY";
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::batch::{
        check_folder, decorate_folder, discover_python_files, remove_folder, BatchReport,
    };
    pub use crate::config::{CoreConfig, Discovery};
    pub use crate::crypto::{generate_keypair, KeyPair, KeyProvider, StaticKeys};
    pub use crate::engine::{
        check_file, check_text, commit, decorate_file, decorate_text, remove_file, remove_text,
        CheckReport, FileRewrite, UnitCheck, VerificationResult,
    };
    pub use crate::extract::UnitKind;
    pub use crate::{SealError, SealResult};
}
