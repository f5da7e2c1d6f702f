//! Command modules for the zvm CLI.
//!
//! ## Lifecycle Commands
//!
//! - [`install`] - Download and install a version
//! - [`uninstall`] - Remove an installed version
//! - [`use_cmd`] - Make a version current
//!
//! ## Query Commands
//!
//! - [`list`] - List installed versions
//! - [`current`] - Print the current version
//! - [`available`] - List remote versions
//! - [`options`] - List configurable settings

pub mod available;
pub mod current;
pub mod install;
pub mod list;
pub mod options;
pub mod uninstall;
pub mod use_cmd;
