//! Per-version install metadata.
//!
//! Stored as `.zvm-metadata.json` inside each version directory. The file is
//! informational only; a version without it is still considered installed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata file name stored in each version directory.
pub const METADATA_FILE: &str = ".zvm-metadata.json";

/// Metadata about a toolchain installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMetadata {
    /// When the version was placed in the store.
    pub installed_at: DateTime<Utc>,
    /// The artifact URL the version was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// The verified SHA-256 digest of the artifact, if one was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl InstallMetadata {
    /// Creates metadata stamped with the current time.
    #[must_use = "returns new metadata without side effects"]
    pub fn now(source_url: Option<String>, sha256: Option<String>) -> Self {
        Self {
            installed_at: Utc::now(),
            source_url,
            sha256,
        }
    }

    /// Returns a human-readable relative time string (e.g., "2 days ago").
    #[must_use = "returns formatted time without side effects"]
    pub fn installed_ago(&self) -> String {
        self.installed_ago_at(Utc::now())
    }

    fn installed_ago_at(&self, now: DateTime<Utc>) -> String {
        let diff_days = now
            .date_naive()
            .signed_duration_since(self.installed_at.date_naive())
            .num_days()
            .max(0);

        match diff_days {
            0 => "today".to_string(),
            1 => "yesterday".to_string(),
            2..=6 => format!("{diff_days} days ago"),
            7..=13 => "1 week ago".to_string(),
            14..=20 => "2 weeks ago".to_string(),
            21..=27 => "3 weeks ago".to_string(),
            28..=59 => "1 month ago".to_string(),
            60..=89 => "2 months ago".to_string(),
            90..=364 => format!("{} months ago", diff_days / 30),
            _ => format!("{} years ago", diff_days / 365),
        }
    }
}
