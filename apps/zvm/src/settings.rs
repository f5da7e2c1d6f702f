//! Builds the core configuration from defaults, environment and `--set`.
//!
//! Later sources win: defaults, then environment variables, then each
//! `--set key=value` in command-line order. Every value goes through the
//! core's option validators, so an environment variable is rejected with
//! the same message as the equivalent `--set`.

use anyhow::{Context, Result};
use zvm_core::CoreConfig;

/// Environment variables and the option each one sets.
const ENV_OPTIONS: &[(&str, &str)] = &[
    ("ZVM_HOME", "storage_root"),
    ("ZVM_DOWNLOAD_TIMEOUT", "download_timeout_seconds"),
    ("ZVM_MIRROR", "download_mirror_base_url"),
    ("ZVM_INDEX_URL", "index_url"),
];

/// Resolves the configuration for this run.
///
/// # Errors
///
/// Returns an error naming the variable or flag whose value was rejected.
pub fn load(assignments: &[String]) -> Result<CoreConfig> {
    let mut config = CoreConfig::default();

    for (var, key) in ENV_OPTIONS {
        if let Ok(value) = std::env::var(var) {
            config
                .set(key, &value)
                .with_context(|| format!("invalid value in {var}"))?;
        }
    }

    for assignment in assignments {
        config
            .apply_assignment(assignment)
            .with_context(|| format!("invalid --set {assignment}"))?;
    }

    Ok(config)
}
