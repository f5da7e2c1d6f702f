//! Persisted search-path rebinding.
//!
//! Switching versions rewrites the persisted `PATH` for a scope so that it
//! carries exactly one segment owned by the store, placed first:
//!
//! 1. read the persisted value
//! 2. split it on the platform separator, dropping empty segments
//! 3. drop every segment inside the store root
//! 4. prepend the new version's binary directory
//! 5. write the joined value back
//!
//! Where the value lives depends on the platform:
//!
//! - Windows: the registry (`HKCU\Environment` or the machine-wide
//!   `Session Manager\Environment`)
//! - Unix: a POSIX script per scope (`<root>/env`, `/etc/profile.d/zvm.sh`),
//!   sourced from the user's shell profile
//!
//! The running process's own environment is never modified; the new value
//! takes effect in shells started afterwards.

#[cfg(unix)]
mod profile;
#[cfg(windows)]
mod registry;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::errors::Result;

#[cfg(unix)]
pub use profile::{ProfilePathVariable, Shell};
#[cfg(windows)]
pub use registry::RegistryPathVariable;

/// Separator between `PATH` segments on this platform.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

const PATH_SEPARATOR_STR: &str = if cfg!(windows) { ";" } else { ":" };

/// Which persisted `PATH` to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathScope {
    /// The current user's environment.
    User,
    /// The machine-wide environment; usually needs elevation.
    Machine,
}

impl fmt::Display for PathScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Machine => f.write_str("machine"),
        }
    }
}

/// Storage for a persisted `PATH` value.
pub trait PathVariable: Send + Sync {
    /// Reads the persisted value for `scope`.
    ///
    /// # Errors
    ///
    /// Returns `Privilege` if reading is denied, `FileSystem` otherwise.
    fn read(&self, scope: PathScope) -> Result<String>;

    /// Replaces the persisted value for `scope`.
    ///
    /// # Errors
    ///
    /// Returns `Privilege` if writing is denied, `FileSystem` otherwise.
    fn write(&self, scope: PathScope, value: &str) -> Result<()>;

    /// Describes where the value for `scope` is stored.
    fn location(&self, scope: PathScope) -> String;

    /// How a user makes the new value visible, if it is not automatic.
    fn activation_hint(&self, _scope: PathScope) -> Option<String> {
        None
    }
}

/// Result of a successful [`EnvironmentBinder::bind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// The scope that was rewritten.
    pub scope: PathScope,
    /// Where the value is stored.
    pub location: String,
    /// The value written.
    pub value: String,
    /// How to pick up the new value in an existing shell.
    pub hint: Option<String>,
}

/// Rewrites persisted search paths to point at one store version.
#[derive(Clone)]
pub struct EnvironmentBinder {
    store_root: PathBuf,
    variable: Arc<dyn PathVariable>,
}

impl fmt::Debug for EnvironmentBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentBinder")
            .field("store_root", &self.store_root)
            .finish_non_exhaustive()
    }
}

impl EnvironmentBinder {
    /// Creates a binder that treats every segment inside `store_root` as
    /// managed and persists values through `variable`.
    #[must_use]
    pub fn new(store_root: impl Into<PathBuf>, variable: Arc<dyn PathVariable>) -> Self {
        Self {
            store_root: store_root.into(),
            variable,
        }
    }

    /// Creates a binder using the platform's native storage.
    #[must_use]
    pub fn for_platform(store_root: impl Into<PathBuf>) -> Self {
        let store_root = store_root.into();
        #[cfg(unix)]
        let variable: Arc<dyn PathVariable> = Arc::new(ProfilePathVariable::new(&store_root));
        #[cfg(windows)]
        let variable: Arc<dyn PathVariable> = Arc::new(RegistryPathVariable);
        Self::new(store_root, variable)
    }

    /// Rewrites the `scope` search path so `bin_dir` is its only store-owned
    /// segment, placed first.
    ///
    /// # Errors
    ///
    /// Returns `Privilege` when the scope cannot be written without
    /// elevation, or `FileSystem` for other storage failures.
    pub fn bind(&self, bin_dir: &Path, scope: PathScope) -> Result<BindOutcome> {
        let current = self.variable.read(scope)?;
        let value = rebind_path(&current, &self.store_root, bin_dir);
        self.variable.write(scope, &value)?;

        let location = self.variable.location(scope);
        info!(%scope, location = %location, bin = %bin_dir.display(), "search path rebound");
        Ok(BindOutcome {
            scope,
            location,
            value,
            hint: self.variable.activation_hint(scope),
        })
    }

    /// Returns the store-owned segments currently persisted for `scope`.
    ///
    /// # Errors
    ///
    /// Returns the storage backend's read error.
    pub fn managed_segments(&self, scope: PathScope) -> Result<Vec<String>> {
        let current = self.variable.read(scope)?;
        Ok(split_path(&current)
            .filter(|segment| is_within(segment, &self.store_root))
            .map(str::to_string)
            .collect())
    }
}

/// Removes every segment of `current` inside `store_root` and prepends
/// `bin_dir`. Empty segments are dropped.
#[must_use]
pub fn rebind_path(current: &str, store_root: &Path, bin_dir: &Path) -> String {
    let bin = bin_dir.to_string_lossy();
    let mut segments = vec![bin.as_ref()];
    segments.extend(split_path(current).filter(|segment| !is_within(segment, store_root)));
    segments.join(PATH_SEPARATOR_STR)
}

fn split_path(value: &str) -> impl Iterator<Item = &str> {
    value.split(PATH_SEPARATOR).filter(|segment| !segment.trim().is_empty())
}

/// Component-wise prefix test; case-insensitive on Windows.
fn is_within(segment: &str, root: &Path) -> bool {
    let root = root.to_string_lossy();
    let (segment, root) = if cfg!(windows) {
        (segment.trim().to_lowercase(), root.to_lowercase())
    } else {
        (segment.trim().to_string(), root.into_owned())
    };

    let normal = |p: &str| -> Vec<String> {
        Path::new(p)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    };
    let segment = normal(&segment);
    let root = normal(&root);
    !root.is_empty() && segment.len() >= root.len() && segment[..root.len()] == root[..]
}
