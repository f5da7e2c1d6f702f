//! Error types for the version lifecycle engine.
//!
//! Every fallible operation in this crate returns [`ZvmError`]. Each variant
//! belongs to one of four broad classes exposed through [`ZvmError::kind`],
//! which callers use to decide how to present a failure (a validation error is
//! the user's mistake, a privilege error needs an elevated shell, and so on).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::binder::PathScope;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ZvmError> = std::result::Result<T, E>;

/// Broad classification of a [`ZvmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Index fetch or artifact download failed.
    Network,
    /// Local I/O, archive corruption or checksum mismatch.
    FileSystem,
    /// The request was rejected before any destructive step.
    Validation,
    /// Writing the environment requires elevation.
    Privilege,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::FileSystem => "filesystem",
            Self::Validation => "validation",
            Self::Privilege => "privilege",
        };
        f.write_str(name)
    }
}

/// Consolidated error type for toolchain lifecycle operations.
#[derive(Debug, Error)]
pub enum ZvmError {
    /// Network failure during index fetch or download.
    #[error("network error: {message}")]
    Network {
        /// Description of the failed request.
        message: String,
        /// The underlying error, when one is available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error reading or writing files.
    #[error("I/O error: {message}")]
    FileSystem {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An archive could not be read or contained unsafe entries.
    #[error("archive error: {message}")]
    Archive {
        /// Description of the archive problem.
        message: String,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The expected checksum.
        expected: String,
        /// The actual checksum.
        actual: String,
    },

    /// No catalog entry matches the identifier.
    #[error("version '{id}' was not found in the release index")]
    NotFound {
        /// The requested identifier.
        id: String,
    },

    /// The catalog entry exists but publishes nothing for this host.
    #[error("version '{id}' has no download for {tag}")]
    UnsupportedArchitecture {
        /// The requested identifier.
        id: String,
        /// The host architecture-OS tag.
        tag: String,
    },

    /// The version is not present in the store.
    #[error("version '{id}' is not installed")]
    NotInstalled {
        /// The requested identifier.
        id: String,
    },

    /// Refused to remove the active version.
    #[error("version '{id}' is the current version; switch to another version first")]
    UninstallCurrent {
        /// The requested identifier.
        id: String,
    },

    /// The identifier cannot be used as a store directory name.
    #[error("invalid version identifier '{id}': {reason}")]
    InvalidId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The artifact is not a zip, tar.gz or tar.xz archive.
    #[error("unsupported archive format: {}", path.display())]
    UnsupportedArchive {
        /// The archive that was rejected.
        path: PathBuf,
    },

    /// The installed version does not contain the toolchain executable.
    #[error("version '{id}' does not contain {}", path.display())]
    MissingExecutable {
        /// The version identifier.
        id: String,
        /// Where the executable was expected.
        path: PathBuf,
    },

    /// A configuration option key or value was rejected.
    #[error("invalid option '{key}': {message}")]
    InvalidOption {
        /// The option key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("store is locked by another process: {holder}\nIf no other zvm process is running, remove the lock file:\n  {}", lock_path.display())]
    Locked {
        /// Human-readable description of the holder.
        holder: String,
        /// Path of the lock file.
        lock_path: PathBuf,
    },

    /// Writing the search path for `scope` was denied.
    #[error("insufficient privileges to update the {scope} PATH: {message}")]
    Privilege {
        /// The scope whose variable could not be written.
        scope: PathScope,
        /// Description of the denied operation.
        message: String,
    },
}

impl ZvmError {
    /// Returns the broad class of this error.
    #[must_use = "returns the classification without side effects"]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::FileSystem { .. } | Self::Archive { .. } | Self::ChecksumMismatch { .. } => {
                ErrorKind::FileSystem
            }
            Self::Privilege { .. } => ErrorKind::Privilege,
            Self::NotFound { .. }
            | Self::UnsupportedArchitecture { .. }
            | Self::NotInstalled { .. }
            | Self::UninstallCurrent { .. }
            | Self::InvalidId { .. }
            | Self::UnsupportedArchive { .. }
            | Self::MissingExecutable { .. }
            | Self::InvalidOption { .. }
            | Self::Locked { .. } => ErrorKind::Validation,
        }
    }

    /// Creates a new `Network` error without an underlying cause.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Network` error wrapping `source`.
    #[must_use]
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new `FileSystem` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::FileSystem {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Archive` error.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(id: impl Into<String>) -> Self {
        Self::NotInstalled { id: id.into() }
    }

    /// Creates a new `InvalidOption` error.
    #[must_use]
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Attaches a descriptive message to I/O results.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn io_context<F, S>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| ZvmError::io(message(), e))
    }
}
