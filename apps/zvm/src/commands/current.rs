//! Current command for the zvm CLI.

use anyhow::Result;
use zvm_core::{CoreConfig, VersionStore};

/// Prints the current version, or a note when none is set.
///
/// # Errors
///
/// Returns an error if the pointer exists but cannot be read.
pub fn execute(config: &CoreConfig) -> Result<()> {
    let store = VersionStore::new(&config.storage_root);
    match store.current()? {
        Some(version) => println!("{version}"),
        None => println!("No current version. Run 'zvm use <version>' to set one."),
    }
    Ok(())
}
