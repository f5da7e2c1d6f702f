//! Install command for the zvm CLI.
//!
//! ## Usage
//!
//! ```bash
//! zvm install 0.12.0    # Install a release
//! zvm install master    # Install the latest development build
//! ```

use anyhow::{Context, Result};
use clap::Args;
use zvm_core::{BindOutcome, CoreConfig, InstallOutcome, Installer, Platform};

use crate::progress;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install (e.g., "0.12.0" or "master").
    pub version: String,
}

/// Executes the install command.
///
/// # Process
///
/// 1. Resolve the version in the release index
/// 2. Download the archive with progress display
/// 3. Verify the SHA-256 checksum when the index publishes one
/// 4. Extract into the store
/// 5. Make it current and update the user PATH if no version was current
///
/// # Errors
///
/// Returns an error if the version cannot be resolved, downloaded, verified
/// or extracted, or if another zvm command holds the store.
pub async fn execute(config: &CoreConfig, args: &InstallArgs) -> Result<()> {
    let installer = Installer::new(config)?;
    let version = &args.version;

    println!("Installing Zig {version} for {}...", Platform::detect());
    let outcome = installer
        .install(version, Some(progress::printer()))
        .await
        .with_context(|| format!("failed to install {version}"))?;

    match outcome {
        InstallOutcome::AlreadyInstalled => {
            println!("Zig {version} is already installed.");
        }
        InstallOutcome::Installed { promoted, binding } => {
            println!("Zig {version} installed successfully.");
            if promoted {
                println!("{version} is now the current version.");
            } else {
                println!("Run 'zvm use {version}' to make it the current version.");
            }
            match binding {
                Some(Ok(bound)) => print_binding(&bound),
                Some(Err(e)) => {
                    eprintln!("Warning: could not update PATH automatically: {e}");
                    println!(
                        "Add this directory to PATH: {}",
                        installer.store().binary_dir(version).display()
                    );
                }
                None => {}
            }
        }
    }

    Ok(())
}

/// Reports where PATH was written and how to pick it up.
pub fn print_binding(bound: &BindOutcome) {
    println!("Updated {} PATH ({}).", bound.scope, bound.location);
    if let Some(hint) = &bound.hint {
        println!("{hint}");
    }
}
