use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use codeseal_core::batch::prepare_remove_folder;
use codeseal_core::engine::{prepare_remove, FileRewrite};
use codeseal_core::SealResult;

use super::{commit_one, core_config, finish_rewrite, spinner, FileOut, Target};
use crate::args::Cli;

pub fn run(cli: &Cli, path: &Path) -> Result<ExitCode> {
    let target = Target::resolve(path)?;
    let cfg = core_config(cli);

    let files = match target {
        Target::File(file) => vec![write_back(prepare_remove(&file, &cfg), &file)],
        Target::Folder(dir) => {
            let pb = spinner("stripping annotations")?;
            let report = prepare_remove_folder(&dir, &cfg);
            pb.finish_and_clear();

            report?
                .entries
                .into_iter()
                .map(|(p, r)| write_back(r, &p))
                .collect()
        }
    };

    finish_rewrite("remove", files)
}

fn write_back(prepared: SealResult<FileRewrite>, path: &Path) -> FileOut {
    match prepared {
        Ok(rw) if !rw.found => FileOut::done(path, "none found"),
        other => commit_one(other, path, "removed"),
    }
}
