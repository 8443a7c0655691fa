use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Result};
use codeseal_core::batch::is_python_file;
use codeseal_core::config::{CoreConfig, Discovery};
use codeseal_core::engine::FileRewrite;
use codeseal_core::SealResult;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::args::{Cli, Command};
use crate::output::{self, Tone};

mod check;
mod decorate;
mod init;
mod remove;

pub fn dispatch(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Command::Init { env_file } => init::run(&cli, env_file.as_deref()),
        Command::Decorate { path } => decorate::run(&cli, path),
        Command::Check { path } => check::run(&cli, path),
        Command::Remove { path } => remove::run(&cli, path),
    }
}

/// What a PATH argument points at.
#[derive(Debug, Clone)]
pub enum Target {
    File(PathBuf),
    Folder(PathBuf),
}

impl Target {
    pub fn resolve(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("path '{}' does not exist", path.display()));
        }
        if path.is_dir() {
            return Ok(Self::Folder(path.to_path_buf()));
        }
        if !is_python_file(path) {
            return Err(anyhow!("file '{}' is not a Python file", path.display()));
        }
        Ok(Self::File(path.to_path_buf()))
    }
}

pub fn core_config(cli: &Cli) -> CoreConfig {
    let mut cfg = CoreConfig::with_namespace(cli.namespace.clone());
    if cli.recursive {
        cfg.discovery = Discovery::Recursive;
    }
    cfg
}

/// Spinner for folder runs; hidden in JSON mode.
pub fn spinner(msg: &str) -> Result<ProgressBar> {
    if output::is_json() {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(msg.to_string());
    Ok(pb)
}

/// Outcome of writing one file back.
#[derive(Debug, Serialize)]
pub struct FileOut {
    pub path: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOut {
    pub fn done(path: &Path, status: &'static str) -> Self {
        Self {
            path: path.display().to_string(),
            status,
            error: None,
        }
    }

    pub fn failed(path: &Path, error: impl ToString) -> Self {
        Self {
            path: path.display().to_string(),
            status: "error",
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewriteOut {
    pub command: &'static str,
    pub ok: bool,
    pub files: Vec<FileOut>,
}

/// Commit a prepared rewrite. `label` names the change (e.g. "decorated").
pub fn commit_one(prepared: SealResult<FileRewrite>, path: &Path, label: &'static str) -> FileOut {
    let rw = match prepared {
        Ok(rw) => rw,
        Err(e) => return FileOut::failed(path, e),
    };
    match rw.commit() {
        Ok(true) => FileOut::done(path, label),
        Ok(false) => FileOut::done(path, "unchanged"),
        Err(e) => FileOut::failed(path, e),
    }
}

/// Print the outcome of a decorate/remove run and pick the exit code.
pub fn finish_rewrite(command: &'static str, files: Vec<FileOut>) -> Result<ExitCode> {
    let failed = files.iter().filter(|f| f.error.is_some()).count();
    let out = RewriteOut {
        command,
        ok: failed == 0,
        files,
    };

    if output::is_json() {
        output::print(&out)?;
    } else {
        for f in &out.files {
            match &f.error {
                Some(e) => output::item(Tone::Fail, &format!("{}: {e}", f.path)),
                None if f.status == "none found" || f.status == "unchanged" => {
                    output::item(Tone::Warn, &format!("{} ({})", f.path, f.status))
                }
                None => output::item(Tone::Ok, &format!("{} ({})", f.path, f.status)),
            }
        }
        if failed == 0 {
            output::headline(Tone::Ok, &format!("{command}: {} file(s) processed", out.files.len()));
        } else {
            output::headline(Tone::Fail, &format!("{command}: {failed} file(s) failed"));
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
