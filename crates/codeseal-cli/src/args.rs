use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "codeseal",
    version,
    about = "Sign Python functions and classes with Ed25519 annotations"
)]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Environment file holding the key pair (default: .env).
    #[arg(long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Namespace of the injected annotations.
    #[arg(long, global = true, default_value = codeseal_core::defaults::NAMESPACE)]
    pub namespace: String,

    /// Descend into subfolders when PATH is a folder.
    #[arg(short, long, global = true)]
    pub recursive: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a key pair and store it in an environment file.
    Init {
        /// Path of the environment file to write.
        env_file: Option<PathBuf>,
    },

    /// Sign every function and class in a Python file or folder.
    Decorate {
        /// Python file or folder.
        path: PathBuf,
    },

    /// Verify the annotations in a Python file or folder.
    Check {
        /// Python file or folder.
        path: PathBuf,
    },

    /// Strip codeseal annotations from a Python file or folder.
    Remove {
        /// Python file or folder.
        path: PathBuf,
    },
}
