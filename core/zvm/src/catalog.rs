//! Remote release catalog.
//!
//! The catalog turns the release index (`index.json`) into
//! [`VersionDescriptor`]s for the host platform. It keeps no local state;
//! every call fetches the index again.
//!
//! ## Index format
//!
//! ```json
//! {
//!   "master": { "version": "0.14.0-dev.1+abc", "date": "2024-12-05",
//!               "x86_64-linux": { "tarball": "https://…", "shasum": "…", "size": "…" } },
//!   "0.12.0": { "date": "2024-04-20",
//!               "x86_64-linux": { "tarball": "https://…", "shasum": "…", "size": "…" } }
//! }
//! ```
//!
//! Unknown fields are ignored and malformed entries are skipped, so a
//! partially unexpected index still yields every entry that can be read.
//!
//! When the index cannot be fetched or parsed, [`VersionCatalog::available`]
//! degrades to a small built-in set of stable releases instead of failing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::OFFICIAL_DOWNLOAD_BASE;
use crate::errors::{Result, ZvmError};
use crate::platform::Platform;
use crate::transport::Transport;
use crate::version::compare_versions;

/// Key of the rolling development entry.
pub const MASTER_KEY: &str = "master";

/// Releases offered when the index is unreachable, newest first.
const FALLBACK_RELEASES: &[(&str, &str)] = &[
    ("0.12.0", "2024-12-02"),
    ("0.11.0", "2024-07-15"),
    ("0.10.1", "2024-02-28"),
    ("0.9.1", "2023-10-10"),
];

/// Release channel of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Tagged releases.
    Stable,
    /// The rolling `master` build and other dev builds.
    Dev,
    /// Nightly builds.
    Nightly,
}

impl Channel {
    /// Classifies an index entry by its key and embedded version.
    #[must_use]
    pub fn classify(key: &str, version: Option<&str>) -> Self {
        if key == MASTER_KEY || version.is_some_and(|v| v.contains("dev")) {
            Self::Dev
        } else if key.contains("nightly") {
            Self::Nightly
        } else {
            Self::Stable
        }
    }

    /// Lowercase name used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Dev => "dev",
            Self::Nightly => "nightly",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "dev" | "development" | "master" => Ok(Self::Dev),
            "nightly" => Ok(Self::Nightly),
            other => Err(format!("unknown channel '{other}' (expected stable, dev or nightly)")),
        }
    }
}

/// One downloadable file for one architecture-OS tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Download URL, already rewritten for the configured mirror.
    pub url: String,
    /// Published SHA-256 digest, if any.
    pub sha256: Option<String>,
    /// Published size in bytes, if any.
    pub size: Option<u64>,
}

/// Resolved metadata for one remote release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    /// The identifier the release is installed under.
    pub id: String,
    /// Release date, when the index provides a valid one.
    pub release_date: Option<NaiveDate>,
    /// Release channel.
    pub channel: Channel,
    /// Artifacts keyed by architecture-OS tag.
    pub downloads: BTreeMap<String, Artifact>,
}

impl VersionDescriptor {
    /// Returns the artifact for `tag`.
    #[must_use]
    pub fn artifact(&self, tag: &str) -> Option<&Artifact> {
        self.downloads.get(tag)
    }

    /// Returns the download URL for `tag`.
    #[must_use]
    pub fn download_url(&self, tag: &str) -> Option<&str> {
        self.artifact(tag).map(|a| a.url.as_str())
    }
}

/// An index entry as read, before host filtering.
#[derive(Debug, Clone)]
struct IndexEntry {
    key: String,
    version: Option<String>,
    release_date: Option<NaiveDate>,
    downloads: BTreeMap<String, Artifact>,
}

impl IndexEntry {
    fn channel(&self) -> Channel {
        Channel::classify(&self.key, self.version.as_deref())
    }

    fn descriptor(&self, id: &str) -> VersionDescriptor {
        VersionDescriptor {
            id: id.to_string(),
            release_date: self.release_date,
            channel: self.channel(),
            downloads: self.downloads.clone(),
        }
    }
}

/// Resolves identifiers to release descriptors from the remote index.
#[derive(Clone)]
pub struct VersionCatalog {
    transport: Arc<dyn Transport>,
    index_url: String,
    mirror_base_url: Option<String>,
    platform: Platform,
}

impl fmt::Debug for VersionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionCatalog")
            .field("index_url", &self.index_url)
            .field("mirror_base_url", &self.mirror_base_url)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl VersionCatalog {
    /// Creates a catalog reading `index_url` through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, index_url: impl Into<String>, platform: Platform) -> Self {
        Self {
            transport,
            index_url: index_url.into(),
            mirror_base_url: None,
            platform,
        }
    }

    /// Rewrites official artifact URLs to `mirror`.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Option<String>) -> Self {
        self.mirror_base_url = mirror.filter(|m| !m.is_empty());
        self
    }

    /// The platform whose artifacts this catalog selects.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Lists releases that publish an artifact for the host, newest first,
    /// optionally restricted to one channel.
    ///
    /// Never fails: when the index cannot be fetched or parsed, the built-in
    /// fallback set is returned instead and a warning is logged.
    pub async fn available(&self, channel: Option<Channel>) -> Vec<VersionDescriptor> {
        let entries = match self.fetch_index().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "release index unavailable; using built-in version list");
                return self
                    .fallback_versions()
                    .into_iter()
                    .filter(|d| channel.is_none_or(|c| d.channel == c))
                    .collect();
            }
        };

        let tag = self.platform.tag();
        let mut descriptors: Vec<_> = entries
            .iter()
            .filter(|entry| entry.downloads.contains_key(&tag))
            .filter(|entry| channel.is_none_or(|c| entry.channel() == c))
            .map(|entry| entry.descriptor(&entry.key))
            .collect();
        descriptors.sort_by(|a, b| compare_versions(&b.id, &a.id));
        descriptors
    }

    /// Resolves `id` to a descriptor.
    ///
    /// Stable entries are matched by key first, then the `master` entry by
    /// its key or embedded version, then any entry by key or embedded
    /// version. When the index is unreachable the fallback set is searched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing matches, `UnsupportedArchitecture` if
    /// the matching entry has no artifact for the host, or the `Network`
    /// error when the index is unreachable and `id` is not in the fallback set.
    pub async fn by_identifier(&self, id: &str) -> Result<VersionDescriptor> {
        let tag = self.platform.tag();

        let entries = match self.fetch_index().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "release index unavailable; searching built-in version list");
                return self
                    .fallback_versions()
                    .into_iter()
                    .find(|d| d.id == id)
                    .ok_or(e);
            }
        };

        let found = entries
            .iter()
            .find(|e| e.channel() == Channel::Stable && e.key == id)
            .or_else(|| {
                entries.iter().find(|e| {
                    e.key == MASTER_KEY && (id == MASTER_KEY || e.version.as_deref() == Some(id))
                })
            })
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| e.key == id || e.version.as_deref() == Some(id))
            })
            .ok_or_else(|| ZvmError::not_found(id))?;

        if !found.downloads.contains_key(&tag) {
            return Err(ZvmError::UnsupportedArchitecture {
                id: id.to_string(),
                tag,
            });
        }

        debug!(id, key = %found.key, "resolved release");
        Ok(found.descriptor(id))
    }

    /// The built-in releases used when the index is unreachable.
    #[must_use]
    pub fn fallback_versions(&self) -> Vec<VersionDescriptor> {
        let tag = self.platform.tag();
        let base = OFFICIAL_DOWNLOAD_BASE.trim_end_matches('/');
        FALLBACK_RELEASES
            .iter()
            .map(|(version, date)| {
                let url = format!(
                    "{base}/{version}/zig-{os}-{arch}-{version}.{ext}",
                    os = self.platform.os_str(),
                    arch = self.platform.arch_str(),
                    ext = self.platform.archive_extension(),
                );
                let artifact = Artifact {
                    url: self.rewrite_url(&url),
                    sha256: None,
                    size: None,
                };
                VersionDescriptor {
                    id: (*version).to_string(),
                    release_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
                    channel: Channel::Stable,
                    downloads: BTreeMap::from([(tag.clone(), artifact)]),
                }
            })
            .collect()
    }

    async fn fetch_index(&self) -> Result<Vec<IndexEntry>> {
        let text = self.transport.fetch_text(&self.index_url).await?;
        self.parse_index(&text)
    }

    fn parse_index(&self, text: &str) -> Result<Vec<IndexEntry>> {
        let root: BTreeMap<String, Value> = serde_json::from_str(text).map_err(|e| {
            ZvmError::network_with_source(format!("failed to parse release index {}", self.index_url), e)
        })?;

        let mut entries = Vec::with_capacity(root.len());
        for (key, value) in root {
            let Some(fields) = value.as_object() else {
                debug!(key, "skipping index entry that is not an object");
                continue;
            };

            let version = fields.get("version").and_then(Value::as_str).map(str::to_string);
            let release_date = fields
                .get("date")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

            let downloads = fields
                .iter()
                .filter_map(|(tag, value)| {
                    let object = value.as_object()?;
                    let url = object.get("tarball")?.as_str()?;
                    Some((
                        tag.clone(),
                        Artifact {
                            url: self.rewrite_url(url),
                            sha256: object.get("shasum").and_then(Value::as_str).map(str::to_string),
                            size: object.get("size").and_then(parse_size),
                        },
                    ))
                })
                .collect();

            entries.push(IndexEntry {
                key,
                version,
                release_date,
                downloads,
            });
        }
        Ok(entries)
    }

    /// Replaces the official download prefix with the configured mirror.
    fn rewrite_url(&self, url: &str) -> String {
        match (&self.mirror_base_url, url.strip_prefix(OFFICIAL_DOWNLOAD_BASE)) {
            (Some(mirror), Some(rest)) => format!("{}/{rest}", mirror.trim_end_matches('/')),
            _ => url.to_string(),
        }
    }
}

/// The index stores sizes as strings; numbers are accepted too.
fn parse_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
