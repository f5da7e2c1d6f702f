#![warn(clippy::pedantic)]

//! End-to-end lifecycle tests for the zvm core library.
//!
//! These tests drive the public API the way the CLI does: a catalog backed by
//! a canned release index, a real on-disk store in a temporary directory, and
//! a search path held in memory so nothing outside the temp dir is touched.
//!
//! The walk-through mirrors a typical session:
//!
//! 1. install a first version (it becomes current and is bound)
//! 2. install a second version (current is unchanged)
//! 3. switch to the second version
//! 4. uninstall the first, refuse to uninstall the current one

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use zvm_core::binder::PATH_SEPARATOR;
use zvm_core::platform::{Arch, Os};
use zvm_core::{
    CoreConfig, EnvironmentBinder, InstallOutcome, Installer, PathScope, PathVariable, Platform,
    ProgressCallback, Result, Transport, ZvmError,
};

const HOST: Platform = Platform::new(Arch::Aarch64, Os::Macos);

struct CannedTransport {
    index: String,
    files: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl Transport for CannedTransport {
    async fn fetch_text(&self, _url: &str) -> Result<String> {
        Ok(self.index.clone())
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        _progress: Option<ProgressCallback>,
    ) -> Result<u64> {
        let body = self
            .files
            .get(url)
            .ok_or_else(|| ZvmError::network(format!("HTTP error 404 Not Found: {url}")))?;
        std::fs::write(dest, body).map_err(|e| ZvmError::io("write failed", e))?;
        Ok(body.len() as u64)
    }
}

#[derive(Default)]
struct InMemoryPath(Mutex<HashMap<PathScope, String>>);

impl PathVariable for InMemoryPath {
    fn read(&self, scope: PathScope) -> Result<String> {
        Ok(self.0.lock().unwrap().get(&scope).cloned().unwrap_or_default())
    }

    fn write(&self, scope: PathScope, value: &str) -> Result<()> {
        self.0.lock().unwrap().insert(scope, value.to_string());
        Ok(())
    }

    fn location(&self, scope: PathScope) -> String {
        format!("test:{scope}")
    }
}

fn url(version: &str) -> String {
    format!("https://ziglang.org/download/{version}/zig-macos-aarch64-{version}.tar.gz")
}

/// Builds a release archive shaped like the official ones: everything below
/// a single `zig-<os>-<arch>-<version>/` folder.
fn release_archive(version: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    let root = format!("zig-macos-aarch64-{version}");
    for (name, body) in [
        ("zig", format!("#!/bin/sh\necho {version}\n")),
        ("lib/std/std.zig", String::new()),
        ("LICENSE", "MIT".to_string()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{name}"), body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn installer(root: &Path, path: Arc<InMemoryPath>) -> Installer {
    let index = format!(
        r#"{{
            "master": {{
                "version": "0.14.0-dev.7+f00",
                "date": "2024-12-05",
                "aarch64-macos": {{ "tarball": "{master}" }}
            }},
            "0.13.0": {{ "date": "2024-06-07", "aarch64-macos": {{ "tarball": "{v13}", "size": "47000000" }} }},
            "0.12.0": {{ "date": "2024-04-20", "aarch64-macos": {{ "tarball": "{v12}" }} }},
            "0.11.0": {{ "date": "2023-08-04", "x86_64-windows": {{ "tarball": "https://ziglang.org/download/0.11.0/zig.zip" }} }}
        }}"#,
        master = url("0.14.0-dev.7+f00"),
        v13 = url("0.13.0"),
        v12 = url("0.12.0"),
    );
    let files = ["0.13.0", "0.12.0", "0.14.0-dev.7+f00"]
        .into_iter()
        .map(|v| (url(v), release_archive(v)))
        .collect();
    let transport = Arc::new(CannedTransport { index, files });

    let config = CoreConfig::with_root(root);
    let binder = EnvironmentBinder::new(root, path);
    Installer::from_parts(&config, transport, HOST, binder)
}

#[tokio::test]
async fn full_version_lifecycle() {
    let temp = tempfile::TempDir::new().unwrap();
    let root = temp.path().join("zvm");
    let path = Arc::new(InMemoryPath::default());
    let system = format!("/usr/local/bin{PATH_SEPARATOR}/usr/bin");
    path.write(PathScope::User, &system).unwrap();
    let installer = installer(&root, path.clone());
    let store = installer.store();

    let first = installer.install("0.12.0", None).await.unwrap();
    assert!(matches!(first, InstallOutcome::Installed { promoted: true, binding: Some(Ok(_)) }));
    assert_eq!(store.current().unwrap().as_deref(), Some("0.12.0"));
    assert!(root.join("versions/0.12.0/zig").is_file());
    assert!(root.join("versions/0.12.0/LICENSE").is_file());

    let second = installer.install("0.13.0", None).await.unwrap();
    assert!(matches!(second, InstallOutcome::Installed { promoted: false, binding: None }));
    assert_eq!(store.current().unwrap().as_deref(), Some("0.12.0"));
    assert_eq!(store.list().unwrap(), vec!["0.13.0", "0.12.0"]);

    let bound = installer.switch_to("0.13.0", PathScope::User).unwrap();
    assert_eq!(store.current().unwrap().as_deref(), Some("0.13.0"));
    assert_eq!(
        bound.value,
        format!(
            "{}{PATH_SEPARATOR}{system}",
            root.join("versions").join("0.13.0").display()
        )
    );
    assert_eq!(bound.location, "test:user");

    let err = installer.uninstall("0.13.0").unwrap_err();
    assert!(matches!(err, ZvmError::UninstallCurrent { .. }));

    installer.uninstall("0.12.0").unwrap();
    assert_eq!(store.list().unwrap(), vec!["0.13.0"]);
    assert!(std::fs::read_dir(store.downloads_dir()).unwrap().next().is_none());
}

#[tokio::test]
async fn nightly_is_installed_by_its_embedded_version() {
    let temp = tempfile::TempDir::new().unwrap();
    let installer = installer(temp.path(), Arc::new(InMemoryPath::default()));

    installer.install("0.14.0-dev.7+f00", None).await.unwrap();

    assert!(installer.store().exists("0.14.0-dev.7+f00"));
}

#[tokio::test]
async fn release_without_host_artifact_is_rejected() {
    let temp = tempfile::TempDir::new().unwrap();
    let installer = installer(temp.path(), Arc::new(InMemoryPath::default()));

    let err = installer.install("0.11.0", None).await.unwrap_err();

    assert!(matches!(err, ZvmError::UnsupportedArchitecture { .. }));
    assert!(installer.store().list().unwrap().is_empty());
}

#[tokio::test]
async fn available_lists_host_releases_newest_first() {
    let temp = tempfile::TempDir::new().unwrap();
    let installer = installer(temp.path(), Arc::new(InMemoryPath::default()));

    let ids: Vec<_> = installer
        .catalog()
        .available(None)
        .await
        .into_iter()
        .map(|d| d.id)
        .collect();

    assert_eq!(ids, vec!["master", "0.13.0", "0.12.0"]);
}
