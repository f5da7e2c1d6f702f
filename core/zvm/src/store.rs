//! On-disk store of installed versions.
//!
//! ```text
//! <root>/
//!   versions/<id>/      flattened toolchain tree
//!   current             id of the active version (absent when unset)
//!   downloads/          temporary archives while installing
//!   .staging/           scratch extraction directories
//!   .lock               advisory lock held by mutating operations
//! ```
//!
//! The store has no network dependency and does no locking of its own;
//! callers that mutate it hold a [`StoreLock`] obtained from [`VersionStore::lock`].

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::extract_archive;
use crate::errors::{IoContext, Result, ZvmError};
use crate::lock::StoreLock;
use crate::metadata::{InstallMetadata, METADATA_FILE};
use crate::version::sort_descending;

const VERSIONS_DIR: &str = "versions";
const CURRENT_FILE: &str = "current";
const DOWNLOADS_DIR: &str = "downloads";
const STAGING_DIR: &str = ".staging";

/// Checks that `id` can be used as a single directory name in the store.
///
/// # Errors
///
/// Returns `InvalidId` if the identifier is empty, contains a path separator,
/// is `.`/`..`, or starts with `.` (reserved for store bookkeeping).
pub fn validate_id(id: &str) -> Result<()> {
    let reason = if id.is_empty() {
        Some("identifier is empty")
    } else if id.contains(['/', '\\']) {
        Some("identifier contains a path separator")
    } else if id.starts_with('.') {
        Some("identifier starts with '.'")
    } else if id.chars().any(char::is_control) || id.contains(':') {
        Some("identifier contains a reserved character")
    } else if id.trim() != id {
        Some("identifier has surrounding whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ZvmError::InvalidId {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Installed versions and the current pointer under one root directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
    require_installed_for_current: bool,
}

impl VersionStore {
    /// Opens the store at `root`. Nothing is created until the first
    /// mutating call.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            require_installed_for_current: false,
        }
    }

    /// Makes [`VersionStore::set_current`] reject versions that are not installed.
    #[must_use]
    pub fn with_require_installed_for_current(mut self, require: bool) -> Self {
        self.require_installed_for_current = require;
        self
    }

    /// The store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every installed version.
    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    /// Directory of version `id` (which may not exist).
    #[must_use]
    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    /// Directory for in-flight downloads.
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(DOWNLOADS_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn current_file(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    /// Creates the root, versions, downloads and staging directories.
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if any directory cannot be created.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.versions_dir(),
            self.downloads_dir(),
            self.staging_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .io_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Takes the store's exclusive lock on behalf of `command`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process holds it.
    pub fn lock(&self, command: &str) -> Result<StoreLock> {
        StoreLock::acquire(&self.root, command)
    }

    /// Lists installed versions, newest first.
    ///
    /// A missing versions directory yields an empty list. Plain files,
    /// dot-prefixed names and entries removed while scanning are skipped.
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if the versions directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.versions_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ZvmError::io(
                    format!("failed to read versions directory: {}", dir.display()),
                    e,
                ));
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            // Another process may be removing a version concurrently.
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                ids.push(name.to_string());
            }
        }

        sort_descending(&mut ids);
        Ok(ids)
    }

    /// Returns whether version `id` is installed.
    #[must_use = "returns installation status without side effects"]
    pub fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.version_dir(id).is_dir()
    }

    /// Extracts `archive` and places it as version `id`, replacing any
    /// existing directory of that name.
    ///
    /// Extraction happens in a scratch directory next to `versions/`, so a
    /// corrupt archive leaves the store unchanged. A single wrapping folder
    /// in the archive is stripped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId`, `UnsupportedArchive`, `Archive` or `FileSystem`.
    pub fn install(&self, id: &str, archive: &Path) -> Result<()> {
        self.install_with_metadata(id, archive, &InstallMetadata::now(None, None))
    }

    /// Like [`VersionStore::install`], recording `metadata` in the new version.
    ///
    /// # Errors
    ///
    /// See [`VersionStore::install`].
    pub fn install_with_metadata(
        &self,
        id: &str,
        archive: &Path,
        metadata: &InstallMetadata,
    ) -> Result<()> {
        validate_id(id)?;
        self.ensure_layout()?;

        let staging = tempfile::Builder::new()
            .prefix(&format!("{id}-"))
            .tempdir_in(self.staging_dir())
            .io_context(|| format!("failed to create staging directory in {}", self.root.display()))?;
        let extracted = staging.path().join("tree");

        debug!(id, archive = %archive.display(), staging = %extracted.display(), "extracting");
        extract_archive(archive, &extracted)?;

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| ZvmError::io("failed to serialize install metadata", std::io::Error::other(e)))?;
        let metadata_path = extracted.join(METADATA_FILE);
        std::fs::write(&metadata_path, content)
            .io_context(|| format!("failed to write metadata to {}", metadata_path.display()))?;

        let target = self.version_dir(id);
        if target.exists() {
            debug!(id, "replacing existing version directory");
            std::fs::remove_dir_all(&target)
                .io_context(|| format!("failed to remove {}", target.display()))?;
        }
        std::fs::rename(&extracted, &target).io_context(|| {
            format!(
                "failed to move {} to {}",
                extracted.display(),
                target.display()
            )
        })?;

        info!(id, path = %target.display(), "version installed");
        Ok(())
    }

    /// Removes version `id`.
    ///
    /// # Errors
    ///
    /// Returns `UninstallCurrent` if `id` is the current version,
    /// `NotInstalled` if it is absent, or `FileSystem` if removal fails.
    pub fn uninstall(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        if self.current()?.as_deref() == Some(id) {
            return Err(ZvmError::UninstallCurrent { id: id.to_string() });
        }
        if !self.exists(id) {
            return Err(ZvmError::not_installed(id));
        }

        let dir = self.version_dir(id);
        std::fs::remove_dir_all(&dir).io_context(|| format!("failed to remove {}", dir.display()))?;
        info!(id, "version uninstalled");
        Ok(())
    }

    /// Returns the current version, or `None` when the pointer is absent
    /// or blank.
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if the pointer exists but cannot be read.
    pub fn current(&self) -> Result<Option<String>> {
        let path = self.current_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ZvmError::io(
                    format!("failed to read current version from {}", path.display()),
                    e,
                ));
            }
        };
        let id = content.trim();
        if id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(id.to_string()))
        }
    }

    /// Points `current` at `id`, replacing the pointer atomically.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId`, `NotInstalled` when the store requires installed
    /// versions, or `FileSystem` if the pointer cannot be written.
    pub fn set_current(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        if self.require_installed_for_current && !self.exists(id) {
            return Err(ZvmError::not_installed(id));
        }
        self.write_pointer(id)
    }

    /// Writes the pointer without the installed check, for rollback.
    pub(crate) fn write_pointer(&self, id: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .io_context(|| format!("failed to create directory: {}", self.root.display()))?;

        let path = self.current_file();
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)
            .io_context(|| format!("failed to create temporary file in {}", self.root.display()))?;
        temp.write_all(id.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .io_context(|| format!("failed to write current version to {}", path.display()))?;
        temp.persist(&path)
            .map_err(|e| ZvmError::io(format!("failed to replace {}", path.display()), e.error))?;

        debug!(id, "current pointer updated");
        Ok(())
    }

    /// Removes the pointer. Succeeds if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if the pointer exists but cannot be removed.
    pub fn clear_current(&self) -> Result<()> {
        let path = self.current_file();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ZvmError::io(format!("failed to remove {}", path.display()), e)),
        }
    }

    /// Directory that should appear on PATH for version `id`.
    ///
    /// `versions/<id>/bin` when the toolchain has one, otherwise the version
    /// root (Zig ships its executable at the top level).
    #[must_use]
    pub fn binary_dir(&self, id: &str) -> PathBuf {
        let dir = self.version_dir(id);
        let bin = dir.join("bin");
        if bin.is_dir() { bin } else { dir }
    }

    /// Reads the install metadata of version `id`.
    ///
    /// Returns `None` if the file does not exist or cannot be parsed.
    #[must_use = "returns metadata without side effects"]
    pub fn metadata(&self, id: &str) -> Option<InstallMetadata> {
        let content = std::fs::read_to_string(self.version_dir(id).join(METADATA_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }
}
