use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use codeseal_core::batch::check_folder;
use codeseal_core::engine::{check_file, CheckReport};
use serde::Serialize;

use super::{core_config, spinner, Target};
use crate::args::Cli;
use crate::keys::EnvKeys;
use crate::output::{self, Tone};

#[derive(Debug, Serialize)]
pub struct FileCheckOut {
    pub path: String,
    pub signed: usize,
    pub valid: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CheckReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub ok: bool,
    pub files: Vec<FileCheckOut>,
}

pub fn run(cli: &Cli, path: &Path) -> Result<ExitCode> {
    let target = Target::resolve(path)?;
    let keys = EnvKeys::load(cli.env_file.as_deref())?;
    let cfg = core_config(cli);

    let files = match target {
        Target::File(file) => {
            let report = check_file(&file, &keys, &cfg)?;
            vec![summarize(&file, Ok(report))]
        }
        Target::Folder(dir) => {
            let pb = spinner("verifying signatures")?;
            let batch = check_folder(&dir, &keys, &cfg);
            pb.finish_and_clear();

            batch?
                .entries
                .into_iter()
                .map(|(p, r)| summarize(&p, r.map_err(|e| e.to_string())))
                .collect()
        }
    };

    let ok = files.iter().all(|f| f.error.is_none() && f.failed == 0);
    let out = CheckOut { ok, files };

    if output::is_json() {
        output::print(&out)?;
    } else {
        render(&out);
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn summarize(path: &Path, result: std::result::Result<CheckReport, String>) -> FileCheckOut {
    let path = path.display().to_string();
    match result {
        Ok(report) => FileCheckOut {
            path,
            signed: report.signed_count(),
            valid: report.valid_count(),
            failed: report.failed_count(),
            report: Some(report),
            error: None,
        },
        Err(error) => FileCheckOut {
            path,
            signed: 0,
            valid: 0,
            failed: 0,
            report: None,
            error: Some(error),
        },
    }
}

fn render(out: &CheckOut) {
    let multi = out.files.len() > 1;
    let mut signed = 0;
    let mut failed = 0;

    for f in &out.files {
        if multi {
            output::headline(Tone::Ok, &f.path);
        }
        if let Some(e) = &f.error {
            output::item(Tone::Fail, e);
            continue;
        }
        let Some(report) = &f.report else { continue };
        for unit in &report.units {
            let tone = match (unit.result.has_annotation, unit.result.valid) {
                (_, true) => Tone::Ok,
                (false, _) => Tone::Warn,
                (true, false) => Tone::Fail,
            };
            output::item(
                tone,
                &format!(
                    "{} ({}, lines {}-{}): {}",
                    unit.qualified_name,
                    unit.kind.as_str(),
                    unit.line,
                    unit.end_line,
                    unit.result.message
                ),
            );
        }
        signed += f.signed;
        failed += f.failed;
    }

    let errors = out.files.iter().filter(|f| f.error.is_some()).count();
    if errors > 0 {
        output::headline(Tone::Fail, &format!("{errors} file(s) could not be checked"));
    }
    if failed > 0 {
        output::headline(Tone::Fail, &format!("{failed} annotation(s) failed verification"));
    } else if signed == 0 {
        output::headline(Tone::Warn, "No codeseal annotations found");
    } else if errors == 0 {
        output::headline(Tone::Ok, "All annotations are valid");
    }
}
