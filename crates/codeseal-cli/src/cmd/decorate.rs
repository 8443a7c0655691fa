use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use codeseal_core::batch::prepare_decorate_folder;
use codeseal_core::crypto::KeyProvider;
use codeseal_core::engine::prepare_decorate;

use super::{commit_one, core_config, finish_rewrite, spinner, FileOut, Target};
use crate::args::Cli;
use crate::keys::EnvKeys;

pub fn run(cli: &Cli, path: &Path) -> Result<ExitCode> {
    let target = Target::resolve(path)?;
    let keys = EnvKeys::load(cli.env_file.as_deref())?;
    let cfg = core_config(cli);

    let files = match target {
        Target::File(file) => {
            let key = keys.signing_key()?;
            vec![commit_one(prepare_decorate(&file, &key, &cfg), &file, "decorated")]
        }
        Target::Folder(dir) => {
            let pb = spinner("signing definitions")?;
            let report = prepare_decorate_folder(&dir, &keys, &cfg);
            pb.finish_and_clear();

            report?
                .entries
                .into_iter()
                .map(|(p, r)| commit_one(r, &p, "decorated"))
                .collect::<Vec<FileOut>>()
        }
    };

    finish_rewrite("decorate", files)
}
