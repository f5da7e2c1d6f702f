//! List command for the zvm CLI.
//!
//! ## Output Format
//!
//! ```text
//! Installed versions:
//!
//! * 0.12.0    (current, installed today)
//!   0.11.0    (installed 3 days ago)
//! ```

use anyhow::Result;
use zvm_core::probe::{WhichProbe, probe_system_toolchain};
use zvm_core::{CoreConfig, PathScope, VersionStore};

/// Executes the list command.
///
/// Marks the current version with an asterisk and warns when a toolchain
/// outside the store would be found first on PATH.
///
/// # Errors
///
/// Returns an error if the versions directory cannot be read.
pub fn execute(config: &CoreConfig) -> Result<()> {
    let store = VersionStore::new(&config.storage_root);
    let versions = store.list()?;
    let current = store.current()?;

    if versions.is_empty() {
        println!("No versions installed.");
        println!();
        println!("Run 'zvm available' to see what can be installed.");
        return Ok(());
    }

    println!("Installed versions:");
    println!();

    for version in &versions {
        let is_current = current.as_deref() == Some(version.as_str());

        let mut info_parts = Vec::new();
        if is_current {
            info_parts.push("current".to_string());
        }
        if let Some(meta) = store.metadata(version) {
            info_parts.push(format!("installed {}", meta.installed_ago()));
        }

        let marker = if is_current { "*" } else { " " };
        if info_parts.is_empty() {
            println!("{marker} {version}");
        } else {
            println!("{marker} {version}    ({})", info_parts.join(", "));
        }
    }

    match &current {
        None => {
            println!();
            println!("No current version. Run 'zvm use <version>' to set one.");
        }
        Some(id) if !versions.contains(id) => {
            println!();
            println!("Current version {id} is not installed.");
        }
        Some(_) => {}
    }

    if let Some(found) =
        probe_system_toolchain(&WhichProbe, &config.executable_name, store.root())
        && let Some(warning) = found.shadow_warning(PathScope::User)
    {
        eprintln!();
        eprintln!("Warning: {warning}");
    }

    Ok(())
}
