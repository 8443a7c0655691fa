//! File-level operations: decorate, check, remove.
//!
//! Every operation is a pure function of (text, key material, config). The
//! `*_text` variants work on in-memory text; the `*_file` variants read the
//! file first and return the new text without writing it. Writing back is a
//! separate, explicit step ([`FileRewrite::commit`]).
//!
//! Key material is resolved before any parsing so that a missing key always
//! surfaces as a configuration error, whatever the file contains.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::annotation::PythonDecorator;
use crate::canonical::canonicalize;
use crate::config::{validate_config, CoreConfig};
use crate::crypto::{verify, KeyProvider};
use crate::errors::SealResult;
use crate::extract::{Annotation, SourceFile, UnitKind};
use crate::fsio;
use crate::rewrite;

pub const MSG_NO_SIGNATURE: &str = "No signature found";
pub const MSG_NO_TOKEN: &str = "Signature marker carries no token";

/// Verification outcome for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VerificationResult {
    pub has_annotation: bool,
    pub valid: bool,
    pub token: Option<String>,
    pub message: String,
}

impl VerificationResult {
    fn missing() -> Self {
        Self {
            has_annotation: false,
            valid: false,
            token: None,
            message: MSG_NO_SIGNATURE.to_string(),
        }
    }

    fn rejected(token: Option<String>, message: impl Into<String>) -> Self {
        Self {
            has_annotation: true,
            valid: false,
            token,
            message: message.into(),
        }
    }
}

/// One unit's entry in a check report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnitCheck {
    pub name: String,
    pub qualified_name: String,
    pub kind: UnitKind,
    /// 1-indexed line of the definition keyword.
    pub line: usize,
    pub end_line: usize,
    /// Line of the first tool annotation, if any.
    pub annotation_line: Option<usize>,
    pub result: VerificationResult,
}

/// Per-unit verification results for one file, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CheckReport {
    pub units: Vec<UnitCheck>,
}

impl CheckReport {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// First unit with this qualified name.
    pub fn get(&self, qualified_name: &str) -> Option<&VerificationResult> {
        self.units
            .iter()
            .find(|u| u.qualified_name == qualified_name)
            .map(|u| &u.result)
    }

    pub fn signed_count(&self) -> usize {
        self.units.iter().filter(|u| u.result.has_annotation).count()
    }

    pub fn valid_count(&self) -> usize {
        self.units.iter().filter(|u| u.result.valid).count()
    }

    /// Units that carry an annotation that did not verify.
    pub fn failed_count(&self) -> usize {
        self.signed_count() - self.valid_count()
    }

    /// Map keyed by qualified name. Repeated names get a `@<line>` suffix.
    pub fn to_map(&self) -> BTreeMap<String, VerificationResult> {
        let mut out = BTreeMap::new();
        for u in &self.units {
            let key = if out.contains_key(&u.qualified_name) {
                format!("{}@{}", u.qualified_name, u.line)
            } else {
                u.qualified_name.clone()
            };
            out.insert(key, u.result.clone());
        }
        out
    }
}

/// Text produced for one file, along with the text it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRewrite {
    pub path: PathBuf,
    pub original: String,
    pub text: String,
    /// For removals: whether any tool annotation existed.
    pub found: bool,
}

impl FileRewrite {
    pub fn changed(&self) -> bool {
        self.original != self.text
    }

    /// Atomically write the new text back. Returns whether a write happened.
    pub fn commit(&self) -> SealResult<bool> {
        if !self.changed() {
            return Ok(false);
        }
        commit(&self.path, &self.original, &self.text)?;
        Ok(true)
    }
}

/// Atomically replace `path` with `new_text`, provided it still holds `original`.
pub fn commit(path: &Path, original: &str, new_text: &str) -> SealResult<()> {
    fsio::write_atomic(path, original, new_text)
}

fn formatter(cfg: &CoreConfig) -> SealResult<PythonDecorator> {
    validate_config(cfg)?;
    Ok(PythonDecorator::new(cfg.annotation.namespace.clone()))
}

/// Decorate in-memory text.
pub fn decorate_text(text: &str, keys: &dyn KeyProvider, cfg: &CoreConfig) -> SealResult<String> {
    let key = keys.signing_key()?;
    decorate_with_key(text, &key, cfg)
}

pub(crate) fn decorate_with_key(text: &str, key: &SigningKey, cfg: &CoreConfig) -> SealResult<String> {
    let fmt = formatter(cfg)?;
    rewrite::decorate(text, &fmt, key)
}

/// Check in-memory text.
pub fn check_text(text: &str, keys: &dyn KeyProvider, cfg: &CoreConfig) -> SealResult<CheckReport> {
    let key = keys.verifying_key()?;
    check_with_key(text, &key, cfg)
}

pub(crate) fn check_with_key(text: &str, key: &VerifyingKey, cfg: &CoreConfig) -> SealResult<CheckReport> {
    let fmt = formatter(cfg)?;
    let file = SourceFile::parse(text)?;

    let mut units = Vec::new();
    for unit in file.units() {
        let tool: Vec<Annotation> = unit
            .annotations(&fmt, file.bytes())
            .into_iter()
            .filter(|a| a.kind.is_tool())
            .collect();

        let tokens: Vec<&str> = tool.iter().filter_map(|a| a.kind.token()).collect();

        let result = match (tool.is_empty(), tokens.as_slice()) {
            (true, _) => VerificationResult::missing(),
            (false, []) => VerificationResult::rejected(None, MSG_NO_TOKEN),
            (false, [token]) => {
                let canonical = canonicalize(&file, &unit, &fmt);
                match verify(&canonical, token, key) {
                    Ok(v) => VerificationResult {
                        has_annotation: true,
                        valid: v.valid,
                        token: Some(token.to_string()),
                        message: v.message,
                    },
                    Err(e) => VerificationResult::rejected(
                        Some(token.to_string()),
                        format!("Error verifying signature: {e}"),
                    ),
                }
            }
            (false, many) => VerificationResult::rejected(
                Some(many[0].to_string()),
                format!("Multiple signatures found ({})", many.len()),
            ),
        };

        units.push(UnitCheck {
            name: unit.name.clone(),
            qualified_name: unit.qualified_name.clone(),
            kind: unit.kind,
            line: unit.start_line,
            end_line: unit.end_line,
            annotation_line: tool.first().map(|a| a.start_line),
            result,
        });
    }

    let report = CheckReport { units };
    tracing::debug!(
        units = report.len(),
        signed = report.signed_count(),
        valid = report.valid_count(),
        "checked source"
    );
    Ok(report)
}

/// Remove all tool annotations from in-memory text.
pub fn remove_text(text: &str, cfg: &CoreConfig) -> SealResult<(String, bool)> {
    let fmt = formatter(cfg)?;
    rewrite::remove_annotations(text, &fmt)
}

/// Read `path` and produce its decorated text (not written).
pub fn prepare_decorate(path: &Path, key: &SigningKey, cfg: &CoreConfig) -> SealResult<FileRewrite> {
    let original = fsio::read_source(path, &cfg.limits)?;
    let text = decorate_with_key(&original, key, cfg)?;
    Ok(FileRewrite {
        path: path.to_path_buf(),
        original,
        text,
        found: true,
    })
}

/// Read `path` and produce its text with tool annotations removed (not written).
pub fn prepare_remove(path: &Path, cfg: &CoreConfig) -> SealResult<FileRewrite> {
    let original = fsio::read_source(path, &cfg.limits)?;
    let (text, found) = remove_text(&original, cfg)?;
    Ok(FileRewrite {
        path: path.to_path_buf(),
        original,
        text,
        found,
    })
}

/// Decorated text for the file at `path`.
pub fn decorate_file(path: &Path, keys: &dyn KeyProvider, cfg: &CoreConfig) -> SealResult<String> {
    let key = keys.signing_key()?;
    let rw = prepare_decorate(path, &key, cfg)?;
    tracing::info!(path = %path.display(), changed = rw.changed(), "decorated file");
    Ok(rw.text)
}

/// Verification results for the file at `path`.
pub fn check_file(path: &Path, keys: &dyn KeyProvider, cfg: &CoreConfig) -> SealResult<CheckReport> {
    let key = keys.verifying_key()?;
    let text = fsio::read_source(path, &cfg.limits)?;
    check_with_key(&text, &key, cfg)
}

/// Text of the file at `path` with tool annotations removed, and whether any existed.
pub fn remove_file(path: &Path, cfg: &CoreConfig) -> SealResult<(String, bool)> {
    let rw = prepare_remove(path, cfg)?;
    tracing::info!(path = %path.display(), found = rw.found, "removed annotations");
    Ok((rw.text, rw.found))
}
