//! Available command for the zvm CLI.
//!
//! ## Usage
//!
//! ```bash
//! zvm available                     # Every release for this platform
//! zvm available --channel stable    # Tagged releases only
//! zvm available --json              # Machine-readable output
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Available versions for x86_64-linux:
//!
//!   master    (dev, 2024-12-05)
//!   0.13.0    (stable, 2024-06-07) *
//!   0.12.0    (stable, 2024-04-20)
//!
//!   * = installed
//! ```

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use zvm_core::{Channel, CoreConfig, Installer, VersionDescriptor};

/// Arguments for the available command.
#[derive(Args)]
pub struct AvailableArgs {
    /// Show only one channel: stable, dev or nightly.
    #[clap(long, short = 'c')]
    pub channel: Option<Channel>,

    /// Show versions in JSON format.
    #[clap(long, short = 'j')]
    pub json: bool,
}

/// Version information for JSON output.
#[derive(Debug, Clone, Serialize)]
struct VersionInfo {
    version: String,
    channel: &'static str,
    date: Option<String>,
    url: Option<String>,
    installed: bool,
}

/// Executes the available command.
///
/// Never fails because of the network: an unreachable index falls back to
/// the built-in release list (a warning is logged).
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub async fn execute(config: &CoreConfig, args: &AvailableArgs) -> Result<()> {
    let installer = Installer::new(config)?;
    let descriptors = installer.catalog().available(args.channel).await;
    let tag = installer.catalog().platform().tag();

    let infos: Vec<VersionInfo> = descriptors
        .iter()
        .map(|d| version_info(d, &tag, installer.store().exists(&d.id)))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        output_text(&infos, &tag);
    }
    Ok(())
}

fn version_info(descriptor: &VersionDescriptor, tag: &str, installed: bool) -> VersionInfo {
    VersionInfo {
        version: descriptor.id.clone(),
        channel: descriptor.channel.as_str(),
        date: descriptor.release_date.map(|d| d.to_string()),
        url: descriptor.download_url(tag).map(str::to_string),
        installed,
    }
}

fn output_text(infos: &[VersionInfo], tag: &str) {
    if infos.is_empty() {
        println!("No versions available for {tag}.");
        return;
    }

    println!("Available versions for {tag}:");
    println!();

    let mut any_installed = false;
    for info in infos {
        let detail = match &info.date {
            Some(date) => format!("({}, {date})", info.channel),
            None => format!("({})", info.channel),
        };
        let marker = if info.installed {
            any_installed = true;
            " *"
        } else {
            ""
        };
        println!("  {:<24}{detail}{marker}", info.version);
    }

    if any_installed {
        println!();
        println!("  * = installed");
    }
}
