//! Key material from the environment.
//!
//! Values come from the process environment first, then from the env file.
//! The env file is read without touching the process environment.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use codeseal_core::crypto::keys::{parse_signing_key, parse_verifying_key};
use codeseal_core::crypto::{KeyPair, KeyProvider, SigningKey, VerifyingKey};
use codeseal_core::defaults::{ENV_FILE, PRIVATE_KEY_VAR, PUBLIC_KEY_VAR};
use codeseal_core::{SealError, SealResult};

/// Keys resolved from environment variables and an optional `.env` file.
#[derive(Debug, Clone, Default)]
pub struct EnvKeys {
    source: Option<PathBuf>,
    private_hex: Option<String>,
    public_hex: Option<String>,
}

impl EnvKeys {
    /// Resolve keys using `env_file`, or `.env` in the working directory.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let path = env_file.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(ENV_FILE));
        let file_vars = if path.is_file() {
            read_env_file(&path)?
        } else {
            if env_file.is_some() {
                tracing::warn!(path = %path.display(), "env file not found; using process environment");
            }
            BTreeMap::new()
        };

        let lookup = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_vars.get(var).cloned())
        };

        let keys = Self {
            private_hex: lookup(PRIVATE_KEY_VAR),
            public_hex: lookup(PUBLIC_KEY_VAR),
            source: path.is_file().then_some(path),
        };
        tracing::debug!(
            source = ?keys.source,
            private = keys.private_hex.is_some(),
            public = keys.public_hex.is_some(),
            "resolved key material"
        );
        Ok(keys)
    }

    fn missing(&self, var: &str) -> SealError {
        let where_ = match &self.source {
            Some(p) => format!("environment or {}", p.display()),
            None => "environment".to_string(),
        };
        SealError::configuration_with_hint(
            format!("{var} is not set in the {where_}"),
            format!("export {var} or run `codeseal init` to generate a key pair"),
        )
    }
}

impl KeyProvider for EnvKeys {
    fn signing_key(&self) -> SealResult<SigningKey> {
        let hex = self
            .private_hex
            .as_deref()
            .ok_or_else(|| self.missing(PRIVATE_KEY_VAR))?;
        parse_signing_key(hex)
    }

    fn verifying_key(&self) -> SealResult<VerifyingKey> {
        let hex = self
            .public_hex
            .as_deref()
            .ok_or_else(|| self.missing(PUBLIC_KEY_VAR))?;
        parse_verifying_key(hex)
    }
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut vars = BTreeMap::new();
    for item in iter {
        let (k, v) = item.with_context(|| format!("failed to parse {}", path.display()))?;
        vars.insert(k, v);
    }
    Ok(vars)
}

/// Append a fresh key pair to `path`. Refuses if either variable is already set there.
pub fn store_keypair(path: &Path, pair: &KeyPair) -> Result<()> {
    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    } else {
        String::new()
    };

    if path.exists() {
        let vars = read_env_file(path)?;
        if vars.contains_key(PRIVATE_KEY_VAR) || vars.contains_key(PUBLIC_KEY_VAR) {
            return Err(anyhow!(
                "{} already contains codeseal keys; refusing to overwrite",
                path.display()
            ));
        }
    }

    let mut body = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(&format!("{PRIVATE_KEY_VAR}={}\n", pair.secret_hex().as_str()));
    body.push_str(&format!("{PUBLIC_KEY_VAR}={}\n", pair.public_hex()));

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    restrict_permissions(&file)?;
    file.write_all(body.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<()> {
    Ok(())
}
