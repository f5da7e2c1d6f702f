//! Uninstall command for the zvm CLI.
//!
//! ## Usage
//!
//! ```bash
//! zvm uninstall 0.11.0
//! ```

use anyhow::{Context, Result};
use clap::Args;
use zvm_core::{CoreConfig, Installer};

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Version to remove.
    pub version: String,
}

/// Executes the uninstall command.
///
/// # Errors
///
/// Returns an error if the version is not installed, is the current
/// version, or cannot be removed.
pub fn execute(config: &CoreConfig, args: &UninstallArgs) -> Result<()> {
    let installer = Installer::new(config)?;
    installer
        .uninstall(&args.version)
        .with_context(|| format!("failed to uninstall {}", args.version))?;
    println!("Zig {} uninstalled.", args.version);
    Ok(())
}
