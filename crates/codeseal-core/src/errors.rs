//! Error types for codeseal-core.
//!
//! The taxonomy separates file-level structural failures (which abort an
//! operation on that file) from per-unit outcomes such as a signature that no
//! longer matches. The latter is a normal result and never appears here.
//!
//! - `Parse`: malformed source, reported with a 1-indexed line
//! - `Configuration`: missing or invalid key material, with a remediation hint
//! - `Signing` / `Verification`: cryptographic-layer faults
//! - `Rewrite`: position bookkeeping failed; the file is left untouched
//! - `InvalidArgument`: caller supplied something unusable (empty batch, bad path)
//! - `Io`: reading or writing a file failed

use std::path::PathBuf;

use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("configuration error: {message} ({hint})")]
    Configuration { message: String, hint: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("rewrite aborted: {0}")]
    Rewrite(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Hint attached to configuration errors when no key material is available.
pub const KEY_SETUP_HINT: &str = "run `codeseal init` to generate a key pair";

impl SealError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            hint: KEY_SETUP_HINT.to_string(),
        }
    }

    pub fn configuration_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing(message.into())
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification(message.into())
    }

    pub fn rewrite(message: impl Into<String>) -> Self {
        Self::Rewrite(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code, used in JSON reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Configuration { .. } => "configuration",
            Self::Signing(_) => "signing",
            Self::Verification(_) => "verification",
            Self::Rewrite(_) => "rewrite",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Io { .. } => "io",
        }
    }
}
