//! Configuration structures for codeseal-core.
//!
//! Configuration objects are explicit and passed in by the caller (CLI, tests,
//! embedding tools). The core crate itself does not read environment variables
//! or configuration files.

use crate::errors::{SealError, SealResult};

/// Global configuration container.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub annotation: AnnotationConfig,
    pub limits: LimitsConfig,
    pub discovery: Discovery,
}

impl CoreConfig {
    /// Default configuration with a custom tool namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            annotation: AnnotationConfig {
                namespace: namespace.into(),
            },
            ..Self::default()
        }
    }
}

/// Annotation-related configuration.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Namespace of injected annotations: `@<namespace>._<token>()`.
    pub namespace: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            namespace: crate::defaults::NAMESPACE.to_string(),
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 16 * 1024 * 1024,
            max_files: 100_000,
        }
    }
}

/// How folder operations discover candidate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discovery {
    /// Only `*.py` files directly inside the folder.
    #[default]
    TopLevel,
    /// Every `*.py` file below the folder.
    Recursive,
}

impl Discovery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLevel => "top-level",
            Self::Recursive => "recursive",
        }
    }
}

/// Returns true if `s` is usable as a Python identifier (ASCII subset).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> SealResult<()> {
    if !is_identifier(&cfg.annotation.namespace) {
        return Err(SealError::invalid_argument(format!(
            "namespace must be a Python identifier, got {:?}",
            cfg.annotation.namespace
        )));
    }

    if cfg.limits.max_file_bytes == 0 {
        return Err(SealError::invalid_argument(
            "max_file_bytes must be greater than zero",
        ));
    }

    if cfg.limits.max_files == 0 {
        return Err(SealError::invalid_argument(
            "max_files must be greater than zero",
        ));
    }

    Ok(())
}
