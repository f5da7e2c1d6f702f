//! Startup configuration for the lifecycle engine.
//!
//! [`CoreConfig`] is built once by the caller and never mutated by the core.
//! Individual settings can be changed before construction through the
//! enumerated [`OPTIONS`] table, which pairs each key with a validator so
//! unknown keys and malformed values are rejected up front.

use std::path::PathBuf;

use crate::errors::{Result, ZvmError};

/// Official release index.
pub const DEFAULT_INDEX_URL: &str = "https://ziglang.org/download/index.json";

/// Prefix shared by every official artifact URL.
pub const OFFICIAL_DOWNLOAD_BASE: &str = "https://ziglang.org/download/";

/// Default timeout for artifact downloads, in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Name of the directory created under the user's home or data directory.
const STORE_DIR_NAME: &str = ".zvm";

/// Immutable parameters the core reads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Base directory of installed versions and the current pointer.
    pub storage_root: PathBuf,
    /// Request timeout for artifact downloads, in seconds.
    pub download_timeout_secs: u64,
    /// Replacement for the official download prefix, if set.
    pub download_mirror_base_url: Option<String>,
    /// Location of the release index.
    pub index_url: String,
    /// Base name of the toolchain executable, without extension.
    pub executable_name: String,
    /// Reject `set_current` for versions that are not installed.
    pub require_installed_for_current: bool,
    /// Bind the user PATH when the first installed version is promoted.
    pub bind_on_first_install: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::with_root(default_storage_root())
    }
}

impl CoreConfig {
    /// Creates a configuration with default settings rooted at `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: root.into(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            download_mirror_base_url: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            executable_name: "zig".to_string(),
            require_installed_for_current: false,
            bind_on_first_install: true,
        }
    }

    /// Applies one `key=value` setting through the options table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOption` if the key is unknown or the value does not
    /// pass the option's validator.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let option = find_option(key).ok_or_else(|| {
            ZvmError::invalid_option(key, format!("unknown option; known options: {}", option_keys()))
        })?;
        (option.apply)(self, value).map_err(|message| ZvmError::invalid_option(key, message))
    }

    /// Parses a `key=value` assignment and applies it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOption` if there is no `=` or [`CoreConfig::set`] fails.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ZvmError::invalid_option(assignment, "expected key=value"))?;
        self.set(key.trim(), value.trim())
    }
}

/// Returns the platform default store root.
///
/// `%LOCALAPPDATA%\zvm` on Windows, `~/.zvm` elsewhere. Falls back to a
/// directory relative to the working directory when no home is known.
#[must_use]
pub fn default_storage_root() -> PathBuf {
    #[cfg(windows)]
    {
        if let Some(local) = dirs::data_local_dir() {
            return local.join("zvm");
        }
    }

    dirs::home_dir().map_or_else(|| PathBuf::from(STORE_DIR_NAME), |home| home.join(STORE_DIR_NAME))
}

/// One configurable setting.
pub struct ConfigOption {
    /// Key used on the command line.
    pub key: &'static str,
    /// Short description for help output.
    pub description: &'static str,
    /// Validates `value` and stores it.
    pub apply: fn(&mut CoreConfig, &str) -> std::result::Result<(), String>,
}

/// All settings that may be changed, in display order.
pub const OPTIONS: &[ConfigOption] = &[
    ConfigOption {
        key: "storage_root",
        description: "Directory holding installed versions and the current pointer",
        apply: |config, value| {
            if value.is_empty() {
                return Err("path must not be empty".to_string());
            }
            config.storage_root = PathBuf::from(value);
            Ok(())
        },
    },
    ConfigOption {
        key: "download_timeout_seconds",
        description: "Timeout for artifact downloads, in seconds",
        apply: |config, value| {
            let secs: u64 = value
                .parse()
                .map_err(|_| format!("'{value}' is not a whole number of seconds"))?;
            if secs == 0 {
                return Err("timeout must be greater than zero".to_string());
            }
            config.download_timeout_secs = secs;
            Ok(())
        },
    },
    ConfigOption {
        key: "download_mirror_base_url",
        description: "Mirror replacing https://ziglang.org/download/ (empty to unset)",
        apply: |config, value| {
            if value.is_empty() {
                config.download_mirror_base_url = None;
                return Ok(());
            }
            require_http(value)?;
            config.download_mirror_base_url = Some(value.to_string());
            Ok(())
        },
    },
    ConfigOption {
        key: "index_url",
        description: "Location of the release index JSON",
        apply: |config, value| {
            require_http(value)?;
            config.index_url = value.to_string();
            Ok(())
        },
    },
    ConfigOption {
        key: "require_installed_for_current",
        description: "Reject switching the current pointer to versions not in the store",
        apply: |config, value| {
            config.require_installed_for_current = parse_bool(value)?;
            Ok(())
        },
    },
    ConfigOption {
        key: "bind_on_first_install",
        description: "Update the user PATH when the first version is installed",
        apply: |config, value| {
            config.bind_on_first_install = parse_bool(value)?;
            Ok(())
        },
    },
];

/// Looks up an option by key.
#[must_use]
pub fn find_option(key: &str) -> Option<&'static ConfigOption> {
    OPTIONS.iter().find(|option| option.key == key)
}

fn option_keys() -> String {
    OPTIONS.iter().map(|o| o.key).collect::<Vec<_>>().join(", ")
}

fn require_http(value: &str) -> std::result::Result<(), String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("'{value}' is not an http(s) URL"))
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("'{value}' is not a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = CoreConfig::with_root("/tmp/zvm");
        assert_eq!(config.download_timeout_secs, 300);
        assert_eq!(config.index_url, DEFAULT_INDEX_URL);
        assert!(config.download_mirror_base_url.is_none());
        assert!(!config.require_installed_for_current);
        assert!(config.bind_on_first_install);
    }

    #[test]
    fn set_timeout_parses_number() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        config.set("download_timeout_seconds", "60").unwrap();
        assert_eq!(config.download_timeout_secs, 60);
    }

    #[test]
    fn set_timeout_rejects_garbage_and_zero() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        assert!(config.set("download_timeout_seconds", "soon").is_err());
        assert!(config.set("download_timeout_seconds", "0").is_err());
        assert_eq!(config.download_timeout_secs, 300);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        let err = config.set("colour", "blue").unwrap_err();
        assert!(matches!(err, ZvmError::InvalidOption { ref key, .. } if key == "colour"));
        assert!(err.to_string().contains("storage_root"));
    }

    #[test]
    fn mirror_can_be_set_and_cleared() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        config
            .set("download_mirror_base_url", "https://mirror.example/zig/")
            .unwrap();
        assert_eq!(
            config.download_mirror_base_url.as_deref(),
            Some("https://mirror.example/zig/")
        );
        config.set("download_mirror_base_url", "").unwrap();
        assert!(config.download_mirror_base_url.is_none());
    }

    #[test]
    fn mirror_requires_http_scheme() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        assert!(config.set("download_mirror_base_url", "ftp://x").is_err());
    }

    #[test]
    fn apply_assignment_splits_on_equals() {
        let mut config = CoreConfig::with_root("/tmp/zvm");
        config
            .apply_assignment("require_installed_for_current = yes")
            .unwrap();
        assert!(config.require_installed_for_current);
        assert!(config.apply_assignment("no-equals-sign").is_err());
    }

    #[test]
    fn every_option_key_is_unique() {
        let mut keys: Vec<_> = OPTIONS.iter().map(|o| o.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), OPTIONS.len());
    }
}
