//! Detection of toolchains installed outside the store.
//!
//! A system-wide `zig` earlier on `PATH` shadows the managed one. The
//! lifecycle engine never consults the probe; callers use it to explain why
//! a switched version is not the one their shell runs.

use std::path::{Path, PathBuf};

use crate::binder::PathScope;

/// Capability to locate an executable on the search path.
pub trait SystemProbe {
    /// Returns the first match for `executable` on `PATH`.
    fn find(&self, executable: &str) -> Option<PathBuf>;
}

/// [`SystemProbe`] backed by `which`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhichProbe;

impl SystemProbe for WhichProbe {
    fn find(&self, executable: &str) -> Option<PathBuf> {
        which::which(executable).ok()
    }
}

/// A toolchain executable found on the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemToolchain {
    /// Where the executable was found.
    pub path: PathBuf,
    /// Whether it lives inside the store.
    pub managed: bool,
}

impl SystemToolchain {
    /// Returns a note when the executable shadows the store's version.
    #[must_use]
    pub fn shadow_warning(&self, scope: PathScope) -> Option<String> {
        if self.managed {
            return None;
        }
        Some(format!(
            "{} is found first on PATH and is not managed by zvm; \
             remove it from PATH or place the {scope} PATH entry before it",
            self.path.display()
        ))
    }
}

/// Looks up `executable` with `probe` and classifies it against `store_root`.
#[must_use]
pub fn probe_system_toolchain(
    probe: &dyn SystemProbe,
    executable: &str,
    store_root: &Path,
) -> Option<SystemToolchain> {
    let path = probe.find(executable)?;
    let canonical_root = store_root
        .canonicalize()
        .unwrap_or_else(|_| store_root.to_path_buf());
    let canonical_path = path.canonicalize().unwrap_or_else(|_| path.clone());
    let managed = canonical_path.starts_with(&canonical_root) || path.starts_with(store_root);
    Some(SystemToolchain { path, managed })
}
