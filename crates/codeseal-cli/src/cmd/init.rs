use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use codeseal_core::crypto::generate_keypair;
use codeseal_core::defaults::ENV_FILE;
use serde::Serialize;

use crate::args::Cli;
use crate::keys::store_keypair;
use crate::output::{self, Tone};

#[derive(Debug, Serialize)]
pub struct InitOut {
    pub env_file: String,
    pub public_key: String,
    pub fingerprint: String,
}

pub fn run(cli: &Cli, env_file: Option<&Path>) -> Result<ExitCode> {
    let path: PathBuf = env_file
        .or(cli.env_file.as_deref())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(ENV_FILE));

    let pair = generate_keypair();
    store_keypair(&path, &pair)
        .with_context(|| format!("failed to initialize {}", path.display()))?;
    tracing::info!(path = %path.display(), fingerprint = %pair.fingerprint(), "stored key pair");

    let out = InitOut {
        env_file: path.display().to_string(),
        public_key: pair.public_hex(),
        fingerprint: pair.fingerprint(),
    };

    if output::is_json() {
        output::print(&out)?;
    } else {
        output::headline(Tone::Ok, "Successfully initialized codeseal");
        output::item(Tone::Ok, &format!("key pair stored in {}", out.env_file));
        output::item(Tone::Ok, &format!("public key fingerprint {}", out.fingerprint));
        output::item(Tone::Warn, "keep this file secret and out of version control");
    }
    Ok(ExitCode::SUCCESS)
}
