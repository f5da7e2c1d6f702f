#![warn(clippy::pedantic)]
//! Core library for the zvm toolchain version manager
//!
//! This crate installs, removes and switches between side-by-side versions of
//! the Zig toolchain. It is split into four cooperating parts:
//!
//! | Component | Responsibility |
//! |-----------|----------------|
//! | [`VersionCatalog`] | Reads the remote release index and resolves identifiers |
//! | [`VersionStore`] | Owns `versions/`, `downloads/` and the `current` pointer |
//! | [`Installer`] | Drives the download, verify, extract and switch lifecycle |
//! | [`EnvironmentBinder`] | Rewrites the persisted `PATH` for a user or machine scope |
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//! ├── versions/<id>/      extracted toolchains
//! ├── downloads/          in-flight archives (always cleaned up)
//! ├── .staging/           extraction scratch space
//! ├── current             id of the active version
//! ├── env                 (unix) script carrying the user PATH
//! └── .lock               held while a mutating command runs
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zvm_core::{CoreConfig, Installer, PathScope};
//!
//! async fn switch() -> zvm_core::Result<()> {
//!     let installer = Installer::new(&CoreConfig::default())?;
//!     installer.install("0.12.0", None).await?;
//!     installer.switch_to("0.12.0", PathScope::User)?;
//!     Ok(())
//! }
//! ```
//!
//! All fallible operations return [`ZvmError`]; use [`ZvmError::kind`] to
//! classify failures as network, file system, validation or privilege errors.

pub mod archive;
pub mod binder;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod installer;
pub mod lock;
pub mod metadata;
pub mod platform;
pub mod probe;
pub mod store;
pub mod transport;
pub mod verify;
pub mod version;

#[cfg(test)]
mod testing;

pub use binder::{BindOutcome, EnvironmentBinder, PathScope, PathVariable};
pub use catalog::{Artifact, Channel, VersionCatalog, VersionDescriptor};
pub use config::CoreConfig;
pub use errors::{ErrorKind, Result, ZvmError};
pub use installer::{InstallOutcome, Installer};
pub use platform::Platform;
pub use store::VersionStore;
pub use transport::{HttpTransport, ProgressCallback, ProgressEvent, Transport};
