//! File access for the engine.
//!
//! Reads enforce the configured size limit. Writes are atomic with respect to
//! the read they were derived from: the new text goes to a sibling temporary
//! file, the target is re-read and compared (SHA-256) against the original
//! content, and only then is the temporary file renamed over the target.
//! If anything else wrote the file in between, the rewrite is aborted and the
//! file is left as the other writer left it.

use std::fs;
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::config::LimitsConfig;
use crate::errors::{SealError, SealResult};

/// Read a source file as UTF-8, enforcing `limits.max_file_bytes`.
pub fn read_source(path: &Path, limits: &LimitsConfig) -> SealResult<String> {
    let meta = fs::metadata(path).map_err(|e| SealError::io(path, e))?;
    if !meta.is_file() {
        return Err(SealError::invalid_argument(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if meta.len() > limits.max_file_bytes as u64 {
        return Err(SealError::invalid_argument(format!(
            "{} is too large ({} bytes > limit {})",
            path.display(),
            meta.len(),
            limits.max_file_bytes
        )));
    }
    fs::read_to_string(path).map_err(|e| SealError::io(path, e))
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Replace `path` with `new_text`, provided it still holds `original`.
pub fn write_atomic(path: &Path, original: &str, new_text: &str) -> SealResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| SealError::io(dir, e))?;
    tmp.write_all(new_text.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| SealError::io(tmp.path(), e))?;

    let meta = fs::metadata(path).map_err(|e| SealError::io(path, e))?;
    tmp.as_file()
        .set_permissions(meta.permissions())
        .map_err(|e| SealError::io(tmp.path(), e))?;

    let current = fs::read(path).map_err(|e| SealError::io(path, e))?;
    if digest(&current) != digest(original.as_bytes()) {
        return Err(SealError::rewrite(format!(
            "{} changed on disk during the rewrite; left untouched",
            path.display()
        )));
    }

    tmp.persist(path).map_err(|e| SealError::io(path, e.error))?;
    tracing::debug!(path = %path.display(), bytes = new_text.len(), "wrote file");
    Ok(())
}
