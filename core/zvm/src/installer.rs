//! Version lifecycle orchestration.
//!
//! The [`Installer`] drives the catalog, store and binder through the three
//! mutating operations. Each one holds the store lock for its duration.
//!
//! ```text
//! NotPresent -> Downloading -> Downloaded -> Installed -> Current | Inactive -> Uninstalled
//! ```
//!
//! Switching is transactional: if the search path cannot be rebound, the
//! previous pointer is restored so `current` never names a version the
//! environment does not point at.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::archive::ArchiveFormat;
use crate::binder::{BindOutcome, EnvironmentBinder, PathScope};
use crate::catalog::VersionCatalog;
use crate::config::CoreConfig;
use crate::errors::{IoContext, Result, ZvmError};
use crate::metadata::InstallMetadata;
use crate::platform::Platform;
use crate::store::{VersionStore, validate_id};
use crate::transport::{HttpTransport, ProgressCallback, Transport};
use crate::verify::verify_checksum;

/// What [`Installer::install`] did.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The version was already in the store; nothing was downloaded.
    AlreadyInstalled,
    /// The version was downloaded and placed in the store.
    Installed {
        /// The version became current because no version was.
        promoted: bool,
        /// Result of binding the user search path after promotion, if
        /// binding was attempted. A failure here does not undo the install.
        binding: Option<Result<BindOutcome>>,
    },
}

/// Installs, removes and switches toolchain versions.
#[derive(Clone)]
pub struct Installer {
    catalog: VersionCatalog,
    store: VersionStore,
    binder: EnvironmentBinder,
    transport: Arc<dyn Transport>,
    platform: Platform,
    executable_name: String,
    bind_on_first_install: bool,
}

impl fmt::Debug for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("catalog", &self.catalog)
            .field("store", &self.store)
            .field("binder", &self.binder)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Wires the production collaborators for `config`: HTTP transport,
    /// host platform and the platform's native search-path storage.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(
            config.download_timeout_secs,
        ))?);
        let binder = EnvironmentBinder::for_platform(&config.storage_root);
        Ok(Self::from_parts(config, transport, Platform::detect(), binder))
    }

    /// Builds an installer from explicit collaborators.
    #[must_use]
    pub fn from_parts(
        config: &CoreConfig,
        transport: Arc<dyn Transport>,
        platform: Platform,
        binder: EnvironmentBinder,
    ) -> Self {
        let catalog = VersionCatalog::new(transport.clone(), config.index_url.clone(), platform)
            .with_mirror(config.download_mirror_base_url.clone());
        let store = VersionStore::new(&config.storage_root)
            .with_require_installed_for_current(config.require_installed_for_current);
        Self {
            catalog,
            store,
            binder,
            transport,
            platform,
            executable_name: config.executable_name.clone(),
            bind_on_first_install: config.bind_on_first_install,
        }
    }

    /// The remote catalog.
    #[must_use]
    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// The local store.
    #[must_use]
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// The search-path binder.
    #[must_use]
    pub fn binder(&self) -> &EnvironmentBinder {
        &self.binder
    }

    /// File name of the toolchain executable on this platform.
    #[must_use]
    pub fn executable_file_name(&self) -> String {
        format!("{}{}", self.executable_name, self.platform.executable_extension())
    }

    /// Where the toolchain executable of version `id` is expected.
    #[must_use]
    pub fn executable_path(&self, id: &str) -> PathBuf {
        self.store.binary_dir(id).join(self.executable_file_name())
    }

    /// Downloads and installs version `id`.
    ///
    /// Returns immediately if the version is already installed. Otherwise
    /// the artifact is streamed to a temporary file under `downloads/`,
    /// checked against the published SHA-256 when there is one, and handed
    /// to the store. The temporary file is removed on every exit path.
    ///
    /// When no version was current, `id` becomes current and (if enabled)
    /// the user search path is bound to it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId`, `Locked`, `NotFound`, `UnsupportedArchitecture`,
    /// `UnsupportedArchive`, `Network`, `ChecksumMismatch`, `Archive` or
    /// `FileSystem`. None of them leave a partial version in the store.
    pub async fn install(
        &self,
        id: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<InstallOutcome> {
        validate_id(id)?;
        if self.store.exists(id) {
            info!(id, "version already installed");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let _lock = self.store.lock(&format!("install {id}"))?;
        if self.store.exists(id) {
            info!(id, "version installed by another process");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let descriptor = self.catalog.by_identifier(id).await?;
        let tag = self.platform.tag();
        let artifact = descriptor
            .artifact(&tag)
            .ok_or_else(|| ZvmError::UnsupportedArchitecture {
                id: id.to_string(),
                tag: tag.clone(),
            })?
            .clone();
        let file_name =
            url_file_name(&artifact.url).ok_or_else(|| ZvmError::UnsupportedArchive {
                path: PathBuf::from(&artifact.url),
            })?;
        let format = ArchiveFormat::from_name(&file_name).ok_or_else(|| {
            ZvmError::UnsupportedArchive {
                path: PathBuf::from(&file_name),
            }
        })?;

        self.store.ensure_layout()?;
        let download = tempfile::Builder::new()
            .prefix(&format!("{id}-"))
            .suffix(format.suffix())
            .tempfile_in(self.store.downloads_dir())
            .io_context(|| {
                format!(
                    "failed to create download file in {}",
                    self.store.downloads_dir().display()
                )
            })?
            .into_temp_path();

        debug!(id, url = %artifact.url, dest = %download.display(), "downloading");
        let bytes = self
            .transport
            .download(&artifact.url, &download, progress)
            .await?;
        debug!(id, bytes, "download complete");

        if let Some(expected) = &artifact.sha256 {
            verify_checksum(&download, expected)?;
            debug!(id, "checksum verified");
        }

        let metadata = InstallMetadata::now(Some(artifact.url.clone()), artifact.sha256.clone());
        self.store.install_with_metadata(id, &download, &metadata)?;
        drop(download);

        let promoted = self.store.current()?.is_none();
        let mut binding = None;
        if promoted {
            self.store.set_current(id)?;
            info!(id, "first installed version set as current");
            if self.bind_on_first_install {
                let result = self.binder.bind(&self.store.binary_dir(id), PathScope::User);
                if let Err(e) = &result {
                    warn!(id, error = %e, "installed, but the user PATH could not be updated");
                }
                binding = Some(result);
            }
        }

        Ok(InstallOutcome::Installed { promoted, binding })
    }

    /// Removes version `id` from the store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId`, `UninstallCurrent`, `NotInstalled`, `Locked` or
    /// `FileSystem`. Rejected requests leave the store untouched.
    pub fn uninstall(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        if self.store.current()?.as_deref() == Some(id) {
            return Err(ZvmError::UninstallCurrent { id: id.to_string() });
        }
        if !self.store.exists(id) {
            return Err(ZvmError::not_installed(id));
        }

        // The store checks again under the lock.
        let _lock = self.store.lock(&format!("uninstall {id}"))?;
        self.store.uninstall(id)
    }

    /// Makes version `id` current and rebinds the `scope` search path to it.
    ///
    /// If rebinding fails the pointer is restored to its previous value (or
    /// cleared if there was none) before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId`, `NotInstalled`, `MissingExecutable`, `Locked`,
    /// `Privilege` or `FileSystem`.
    pub fn switch_to(&self, id: &str, scope: PathScope) -> Result<BindOutcome> {
        validate_id(id)?;
        if !self.store.exists(id) {
            return Err(ZvmError::not_installed(id));
        }
        let executable = self.executable_path(id);
        if !executable.is_file() {
            return Err(ZvmError::MissingExecutable {
                id: id.to_string(),
                path: executable,
            });
        }

        let _lock = self.store.lock(&format!("use {id}"))?;
        let previous = self.store.current()?;
        self.store.set_current(id)?;

        match self.binder.bind(&self.store.binary_dir(id), scope) {
            Ok(outcome) => {
                info!(id, %scope, "switched current version");
                Ok(outcome)
            }
            Err(e) => {
                let restored = match &previous {
                    Some(previous) => self.store.write_pointer(previous),
                    None => self.store.clear_current(),
                };
                if let Err(rollback) = restored {
                    warn!(id, error = %rollback, "could not restore the previous current version");
                }
                Err(e)
            }
        }
    }
}

/// Last path segment of an artifact URL, or `None` if the URL does not
/// parse or ends in a slash.
fn url_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()
        .and_then(Iterator::last)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
