//! Use command for the zvm CLI.
//!
//! Makes an installed version current and rewrites the persisted PATH.
//!
//! ## Usage
//!
//! ```bash
//! zvm use 0.12.0             # Current user's PATH
//! zvm use 0.12.0 --machine   # Machine-wide PATH (needs elevation)
//! ```

use anyhow::{Context, Result};
use clap::Args;
use zvm_core::probe::{WhichProbe, probe_system_toolchain};
use zvm_core::{CoreConfig, Installer, PathScope};

use super::install::print_binding;

/// Arguments for the use command.
#[derive(Args)]
pub struct UseArgs {
    /// Installed version to switch to.
    pub version: String,

    /// Update the machine-wide PATH instead of the current user's.
    #[clap(long)]
    pub machine: bool,
}

/// Executes the use command.
///
/// # Errors
///
/// Returns an error if the version is not installed or the PATH cannot be
/// written. A failed PATH write leaves the previous version current.
pub fn execute(config: &CoreConfig, args: &UseArgs) -> Result<()> {
    let installer = Installer::new(config)?;
    let scope = if args.machine {
        PathScope::Machine
    } else {
        PathScope::User
    };

    let bound = installer
        .switch_to(&args.version, scope)
        .with_context(|| format!("failed to switch to {}", args.version))?;

    println!("Now using Zig {}.", args.version);
    print_binding(&bound);

    let executable = installer.executable_file_name();
    if let Some(found) = probe_system_toolchain(&WhichProbe, &executable, installer.store().root())
        && let Some(warning) = found.shadow_warning(scope)
    {
        eprintln!();
        eprintln!("Warning: {warning}");
    }

    Ok(())
}
