//! Folder-level orchestration.
//!
//! - Discovery of candidate `*.py` files (`walkdir`)
//! - Fan-out of one per-file operation over a deduplicated file set
//! - Per-file error isolation: one file's failure is recorded, never propagated
//!
//! With the `parallel` feature, files are processed on the rayon global pool.
//! Key material is resolved once up front and shared read-only.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{validate_config, CoreConfig, Discovery};
use crate::crypto::KeyProvider;
use crate::engine::{self, CheckReport, FileRewrite};
use crate::errors::{SealError, SealResult};

/// Per-file outcomes of a batch run, ordered by path.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub entries: BTreeMap<PathBuf, SealResult<T>>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.len() - self.ok_count()
    }

    pub fn get(&self, path: &Path) -> Option<&SealResult<T>> {
        self.entries.get(path)
    }

    /// Transform successful entries, keeping errors as they are.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchReport<U> {
        BatchReport {
            entries: self
                .entries
                .into_iter()
                .map(|(p, r)| (p, r.map(&mut f)))
                .collect(),
        }
    }
}

/// Run `op` on every file. Duplicate paths (after canonicalization) are
/// processed once.
pub fn apply_to_files<T, F>(files: &[PathBuf], cfg: &CoreConfig, op: F) -> SealResult<BatchReport<T>>
where
    T: Send,
    F: Fn(&Path) -> SealResult<T> + Sync,
{
    if files.is_empty() {
        return Err(SealError::invalid_argument("no files to process"));
    }

    let unique: BTreeSet<PathBuf> = files
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    if unique.len() > cfg.limits.max_files {
        return Err(SealError::invalid_argument(format!(
            "{} files exceed the limit of {}",
            unique.len(),
            cfg.limits.max_files
        )));
    }

    let unique: Vec<PathBuf> = unique.into_iter().collect();
    let run = |path: &PathBuf| {
        let result = op(path);
        if let Err(e) = &result {
            tracing::warn!(path = %path.display(), error = %e, "file failed");
        }
        (path.clone(), result)
    };

    #[cfg(feature = "parallel")]
    let entries: BTreeMap<PathBuf, SealResult<T>> = {
        use rayon::prelude::*;
        unique.par_iter().map(run).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let entries: BTreeMap<PathBuf, SealResult<T>> = unique.iter().map(run).collect();

    let report = BatchReport { entries };
    tracing::info!(
        files = report.len(),
        failed = report.error_count(),
        "batch finished"
    );
    Ok(report)
}

/// List the Python files under `root`, sorted.
pub fn discover_python_files(root: &Path, discovery: Discovery) -> SealResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(SealError::invalid_argument(format!(
            "folder not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(SealError::invalid_argument(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let walker = match discovery {
        Discovery::TopLevel => WalkDir::new(root).min_depth(1).max_depth(1),
        Discovery::Recursive => WalkDir::new(root).min_depth(1),
    };

    let mut files = Vec::new();
    for entry in walker.sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            match e.into_io_error() {
                Some(io) => SealError::io(path, io),
                None => SealError::invalid_argument(format!(
                    "filesystem loop at {}",
                    path.display()
                )),
            }
        })?;
        if entry.file_type().is_file() && is_python_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(SealError::invalid_argument(format!(
            "no Python files found in {} ({})",
            root.display(),
            discovery.as_str()
        )));
    }

    tracing::debug!(root = %root.display(), files = files.len(), "discovered files");
    Ok(files)
}

/// `*.py`, case-sensitive.
pub fn is_python_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}

/// Decorate every file in the folder. Returns the new texts; nothing is written.
pub fn prepare_decorate_folder(
    root: &Path,
    keys: &dyn KeyProvider,
    cfg: &CoreConfig,
) -> SealResult<BatchReport<FileRewrite>> {
    let key = keys.signing_key()?;
    validate_config(cfg)?;
    let files = discover_python_files(root, cfg.discovery)?;
    apply_to_files(&files, cfg, |p| engine::prepare_decorate(p, &key, cfg))
}

/// Strip tool annotations from every file in the folder; nothing is written.
pub fn prepare_remove_folder(root: &Path, cfg: &CoreConfig) -> SealResult<BatchReport<FileRewrite>> {
    validate_config(cfg)?;
    let files = discover_python_files(root, cfg.discovery)?;
    apply_to_files(&files, cfg, |p| engine::prepare_remove(p, cfg))
}

/// Decorated text for every Python file in the folder.
pub fn decorate_folder(
    root: &Path,
    keys: &dyn KeyProvider,
    cfg: &CoreConfig,
) -> SealResult<BatchReport<String>> {
    Ok(prepare_decorate_folder(root, keys, cfg)?.map(|rw| rw.text))
}

/// Verification results for every Python file in the folder.
pub fn check_folder(
    root: &Path,
    keys: &dyn KeyProvider,
    cfg: &CoreConfig,
) -> SealResult<BatchReport<CheckReport>> {
    let key = keys.verifying_key()?;
    validate_config(cfg)?;
    let files = discover_python_files(root, cfg.discovery)?;
    apply_to_files(&files, cfg, |p| {
        let text = crate::fsio::read_source(p, &cfg.limits)?;
        engine::check_with_key(&text, &key, cfg)
    })
}

/// Stripped text for every Python file in the folder, with whether any
/// annotation existed.
pub fn remove_folder(root: &Path, cfg: &CoreConfig) -> SealResult<BatchReport<(String, bool)>> {
    Ok(prepare_remove_folder(root, cfg)?.map(|rw| (rw.text, rw.found)))
}
