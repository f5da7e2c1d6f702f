#![warn(clippy::pedantic)]

//! # zvm
//!
//! Installs Zig toolchains side by side and switches the one your shell runs.
//!
//! ## Subcommands
//!
//! - `install` - Download and install a version
//! - `uninstall` - Remove an installed version
//! - `use` - Make a version current and point PATH at it
//! - `list` - List installed versions
//! - `current` - Print the current version
//! - `available` - List versions published for this platform
//! - `options` - List the settings accepted by `--set`
//!
//! ## Examples
//!
//! ```bash
//! zvm install 0.12.0
//! zvm use 0.12.0
//! zvm --set download_timeout_seconds=60 install master
//! ZVM_LOG=debug zvm available --channel stable
//! ```

mod commands;
mod progress;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{available, current, install, list, options, uninstall, use_cmd};
use tracing_subscriber::EnvFilter;
use zvm_core::{ErrorKind, ZvmError};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ZVM_LOG";

/// Side-by-side Zig toolchain version manager.
#[derive(Parser)]
#[command(
    name = "zvm",
    author,
    version,
    about = "Install and switch between Zig toolchain versions",
    after_help = "\
ENVIRONMENT VARIABLES:
    ZVM_HOME                Store directory (default: ~/.zvm, %LOCALAPPDATA%\\zvm on Windows)
    ZVM_DOWNLOAD_TIMEOUT    Download timeout in seconds (default: 300)
    ZVM_MIRROR              Mirror replacing https://ziglang.org/download/
    ZVM_INDEX_URL           Release index URL
    ZVM_LOG                 Log filter, e.g. debug or zvm_core=trace (default: warn)"
)]
pub struct Cli {
    /// Override a setting for this run (repeatable). See `zvm options`.
    #[clap(long = "set", value_name = "KEY=VALUE", global = true)]
    pub set: Vec<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the zvm CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Download and install a version.
    ///
    /// The first version installed becomes current and is added to the
    /// user PATH.
    Install(install::InstallArgs),

    /// Remove an installed version.
    ///
    /// The current version cannot be removed; switch to another one first.
    Uninstall(uninstall::UninstallArgs),

    /// Make an installed version current.
    ///
    /// Rewrites the persisted PATH so the version's directory is the only
    /// zvm entry and comes first. Takes effect in new shells.
    Use(use_cmd::UseArgs),

    /// List installed versions, newest first.
    List,

    /// Print the current version.
    Current,

    /// List versions published for this platform.
    Available(available::AvailableArgs),

    /// List the settings accepted by `--set`.
    Options,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Prints the error chain and returns the exit code.
///
/// Privilege failures get a hint about re-running elevated.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    if let Some(zvm_error) = e.downcast_ref::<ZvmError>()
        && zvm_error.kind() == ErrorKind::Privilege
    {
        eprintln!();
        if cfg!(windows) {
            eprintln!("Hint: re-run from an elevated (Administrator) terminal.");
        } else {
            eprintln!("Hint: re-run with sudo, or use the default user scope.");
        }
    }
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = settings::load(&cli.set)?;
    tracing::debug!(root = %config.storage_root.display(), "configuration loaded");

    match cli.command {
        Commands::Install(args) => install::execute(&config, &args).await,
        Commands::Uninstall(args) => uninstall::execute(&config, &args),
        Commands::Use(args) => use_cmd::execute(&config, &args),
        Commands::List => list::execute(&config),
        Commands::Current => current::execute(&config),
        Commands::Available(args) => available::execute(&config, &args).await,
        Commands::Options => {
            options::execute();
            Ok(())
        }
    }
}
