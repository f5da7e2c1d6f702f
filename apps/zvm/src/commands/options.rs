//! Options command for the zvm CLI.

use zvm_core::config::OPTIONS;

/// Prints every key accepted by `--set` with its description.
pub fn execute() {
    println!("Settings (use --set KEY=VALUE):");
    println!();
    for option in OPTIONS {
        println!("  {:<32}{}", option.key, option.description);
    }
}
