//! Archive extraction for downloaded toolchains.
//!
//! Releases ship as `.zip` on Windows and `.tar.xz` elsewhere; `.tar.gz` and
//! `.tgz` are accepted too. Every format goes through the same rules:
//!
//! - entries with absolute paths or `..` components abort the extraction
//! - tar links may not point outside the destination, and no entry is
//!   written through a link placed earlier in the archive
//! - a single folder wrapping every entry is stripped
//!   (`zig-linux-x86_64-0.12.0/zig` becomes `zig`)
//! - Unix permission bits recorded in the archive are restored

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use xz2::read::XzDecoder;

use crate::errors::{IoContext, Result, ZvmError};

/// Archive formats the store can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// ZIP with stored or deflated entries
    Zip,
    /// gzip-compressed tarball
    TarGz,
    /// xz-compressed tarball
    TarXz,
}

impl ArchiveFormat {
    /// Determines the format from a file name or URL suffix.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else {
            None
        }
    }

    /// Returns the canonical file suffix, including the leading dot.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
            Self::TarXz => ".tar.xz",
        }
    }
}

/// Extracts an archive into `dest_dir`, choosing the format from the
/// archive's file name.
///
/// # Errors
///
/// Returns `UnsupportedArchive` before touching `dest_dir` if the format is
/// not recognised, `Archive` if the archive is corrupt or contains unsafe
/// paths, and `FileSystem` if writing fails.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = ArchiveFormat::from_name(&name).ok_or_else(|| ZvmError::UnsupportedArchive {
        path: archive_path.to_path_buf(),
    })?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz | ArchiveFormat::TarXz => extract_tar(archive_path, format, dest_dir),
    }
}

/// Extracts a ZIP archive to the destination directory.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, contains an unsafe path,
/// or an entry cannot be written.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .io_context(|| format!("failed to open archive: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
        ZvmError::archive(format!("failed to read ZIP archive {}: {e}", archive_path.display()))
    })?;

    std::fs::create_dir_all(dest_dir)
        .io_context(|| format!("failed to create directory: {}", dest_dir.display()))?;

    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ZvmError::archive(format!("failed to read archive entry {i}: {e}")))?;
        let raw = PathBuf::from(entry.name());
        ensure_safe_path(&raw)?;
        paths.push(raw);
    }
    let strip_prefix = common_root_folder(paths.iter().map(PathBuf::as_path));

    for (i, entry_path) in paths.iter().enumerate() {
        let Some(relative_path) = strip_root(entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);

        let mut entry = archive
            .by_index(i)
            .map_err(|e| ZvmError::archive(format!("failed to read archive entry {i}: {e}")))?;

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path)
                .io_context(|| format!("failed to create directory: {}", output_path.display()))?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let mut outfile = File::create(&output_path)
            .io_context(|| format!("failed to create file: {}", output_path.display()))?;
        std::io::copy(&mut entry, &mut outfile)
            .io_context(|| format!("failed to extract: {}", output_path.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&output_path, std::fs::Permissions::from_mode(mode & 0o7777))
                .io_context(|| format!("failed to set permissions: {}", output_path.display()))?;
        }
    }

    Ok(())
}

/// Extracts a compressed tarball to the destination directory.
///
/// # Errors
///
/// Returns an error if the archive cannot be decoded, contains an unsafe
/// path, or an entry cannot be written.
pub fn extract_tar(archive_path: &Path, format: ArchiveFormat, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .io_context(|| format!("failed to create directory: {}", dest_dir.display()))?;

    // First pass validates every path and finds the wrapping folder; tar
    // streams cannot be rewound, so the second pass reopens the file.
    let mut paths = Vec::new();
    let mut links = Vec::new();
    let mut archive = open_tar(archive_path, format)?;
    for entry in archive.entries().map_err(|e| tar_error(archive_path, &e))? {
        let entry = entry.map_err(|e| tar_error(archive_path, &e))?;
        let path = entry
            .path()
            .map_err(|e| tar_error(archive_path, &e))?
            .into_owned();
        ensure_safe_path(&path)?;

        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|e| tar_error(archive_path, &e))?
                .ok_or_else(|| {
                    ZvmError::archive(format!("link entry without a target: {}", path.display()))
                })?
                .into_owned();
            links.push(LinkEntry {
                path: path.clone(),
                target,
                hard: kind.is_hard_link(),
            });
        }
        paths.push(path);
    }
    let strip_prefix = common_root_folder(paths.iter().map(PathBuf::as_path));

    // Hard link targets keyed by the stripped path of the link entry.
    let mut hard_links = HashMap::new();
    for link in &links {
        if let Some((relative, target)) = resolve_link_entry(link, strip_prefix.as_deref())? {
            if link.hard {
                hard_links.insert(relative, target);
            }
        }
    }

    let mut archive = open_tar(archive_path, format)?;
    archive.set_preserve_permissions(true);
    for entry in archive.entries().map_err(|e| tar_error(archive_path, &e))? {
        let mut entry = entry.map_err(|e| tar_error(archive_path, &e))?;
        let entry_path = entry
            .path()
            .map_err(|e| tar_error(archive_path, &e))?
            .into_owned();

        let Some(relative_path) = strip_root(&entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        ensure_no_symlink_on_path(dest_dir, &relative_path)?;
        let output_path = dest_dir.join(&relative_path);

        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&output_path)
                .io_context(|| format!("failed to create directory: {}", output_path.display()))?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        // tar resolves hard link targets against the working directory, so
        // they are created here relative to the destination instead.
        if let Some(target) = hard_links.get(&relative_path) {
            let source = dest_dir.join(target);
            ensure_no_symlink_on_path(dest_dir, target)?;
            std::fs::hard_link(&source, &output_path)
                .io_context(|| format!("failed to link: {}", output_path.display()))?;
            continue;
        }

        entry
            .unpack(&output_path)
            .io_context(|| format!("failed to extract: {}", output_path.display()))?;
    }

    Ok(())
}

/// A symlink or hard link recorded during the validation pass.
struct LinkEntry {
    path: PathBuf,
    target: PathBuf,
    hard: bool,
}

/// Checks that a link stays inside the destination once the wrapping folder
/// is stripped.
///
/// Returns the stripped entry path with its target relative to the
/// destination root, or `None` when the entry is the stripped root itself.
fn resolve_link_entry(
    link: &LinkEntry,
    prefix: Option<&Path>,
) -> Result<Option<(PathBuf, PathBuf)>> {
    let Some(relative) = strip_root(&link.path, prefix) else {
        return Ok(None);
    };
    let escapes = || {
        ZvmError::archive(format!(
            "refusing to extract link pointing outside the destination: {} -> {}",
            link.path.display(),
            link.target.display()
        ))
    };
    if link.target.is_absolute() {
        return Err(escapes());
    }

    let resolved = if link.hard {
        // Hard link targets name another entry from the archive root.
        if link
            .target
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(escapes());
        }
        strip_root(&link.target, prefix)
    } else {
        let base = relative.parent().unwrap_or_else(|| Path::new(""));
        resolve_within(base, &link.target)
    };

    resolved.map(|target| Some((relative, target))).ok_or_else(escapes)
}

/// Resolves a symlink target against the directory holding the link.
///
/// `..` is only accepted before the first named component, so the walk up
/// crosses real directories and never a link placed by the archive.
/// Returns `None` when the target climbs above the destination root.
fn resolve_within(base: &Path, target: &Path) -> Option<PathBuf> {
    let mut resolved: Vec<Component<'_>> = base.components().collect();
    let mut descending = false;
    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if !descending => {
                resolved.pop()?;
            }
            Component::Normal(_) => {
                descending = true;
                resolved.push(component);
            }
            _ => return None,
        }
    }
    Some(resolved.into_iter().collect())
}

/// Refuses to write through a symlink already present under `dest_dir`.
fn ensure_no_symlink_on_path(dest_dir: &Path, relative: &Path) -> Result<()> {
    let mut current = dest_dir.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(ZvmError::archive(format!(
                    "refusing to write through symlink: {}",
                    current.display()
                )));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

fn open_tar(archive_path: &Path, format: ArchiveFormat) -> Result<Archive<Box<dyn Read>>> {
    let file = File::open(archive_path)
        .io_context(|| format!("failed to open archive: {}", archive_path.display()))?;
    let reader = BufReader::new(file);
    let decoder: Box<dyn Read> = match format {
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(reader)),
        ArchiveFormat::TarGz | ArchiveFormat::Zip => Box::new(GzDecoder::new(reader)),
    };
    Ok(Archive::new(decoder))
}

fn tar_error(archive_path: &Path, err: &std::io::Error) -> ZvmError {
    ZvmError::archive(format!(
        "failed to read tar entries from {}: {err}",
        archive_path.display()
    ))
}

/// Rejects absolute paths and parent directory references.
fn ensure_safe_path(path: &Path) -> Result<()> {
    let unsafe_component = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_absolute() || unsafe_component {
        return Err(ZvmError::archive(format!(
            "refusing to extract path with parent directory or absolute reference: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Returns `path` relative to the stripped root, or `None` for the root
/// entry itself.
fn strip_root(path: &Path, prefix: Option<&Path>) -> Option<PathBuf> {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let relative = match prefix {
        Some(prefix) => normalized
            .strip_prefix(prefix)
            .map_or_else(|_| normalized.clone(), Path::to_path_buf),
        None => normalized,
    };
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Finds a folder shared by all entries.
///
/// Returns `Some(prefix)` only if every entry starts with the same folder
/// AND at least one entry is nested below it, so a lone file at the archive
/// root is never mistaken for a wrapping folder.
fn common_root_folder<'a>(paths: impl Iterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut common_root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        let mut components = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir));
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() {
            has_nested_entries = true;
        }

        let root = PathBuf::from(first.as_os_str());
        match &common_root {
            None => common_root = Some(root),
            Some(existing) if existing != &root => return None,
            Some(_) => {}
        }
    }

    if has_nested_entries { common_root } else { None }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tar::Builder;
    use tempfile::TempDir;

    fn append_file<W: Write>(builder: &mut Builder<W>, path: &str, body: &[u8], mode: u32) {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder
            .append_data(&mut header, path, body)
            .expect("Should append file");
    }

    /// Writes a tar.gz holding `files` (path, contents) to `archive_path`.
    pub(crate) fn write_tar_gz(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(archive_path).expect("Should create file");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);
        for (path, body) in files {
            append_file(&mut builder, path, body, 0o755);
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");
    }

    fn write_tar_xz(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(archive_path).expect("Should create file");
        let encoder = xz2::write::XzEncoder::new(file, 6);
        let mut builder = Builder::new(encoder);
        for (path, body) in files {
            append_file(&mut builder, path, body, 0o755);
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish xz");
    }

    fn write_zip(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(archive_path).expect("Should create file");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o755);
        for (path, body) in files {
            zip.start_file(*path, options).expect("Should start file");
            zip.write_all(body).expect("Should write file");
        }
        zip.finish().expect("Should finish zip");
    }

    /// An entry for [`write_tar_gz_with_links`].
    enum TarEntry<'a> {
        File(&'a str, &'a [u8]),
        Symlink(&'a str, &'a str),
        HardLink(&'a str, &'a str),
    }

    fn write_tar_gz_with_links(archive_path: &Path, entries: &[TarEntry<'_>]) {
        let file = File::create(archive_path).expect("Should create file");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);
        for entry in entries {
            let (path, target, kind) = match entry {
                TarEntry::File(path, body) => {
                    append_file(&mut builder, path, body, 0o755);
                    continue;
                }
                TarEntry::Symlink(path, target) => (path, target, tar::EntryType::Symlink),
                TarEntry::HardLink(path, target) => (path, target, tar::EntryType::Link),
            };
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(kind);
            header.set_size(0);
            header.set_mode(0o777);
            builder
                .append_link(&mut header, path, target)
                .expect("Should append link");
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");
    }

    const WRAPPED: &[(&str, &[u8])] = &[
        ("zig-linux-x86_64-0.12.0/zig", b"#!/bin/sh\necho zig\n"),
        ("zig-linux-x86_64-0.12.0/lib/std/std.zig", b"pub const x = 1;"),
    ];

    #[test]
    fn format_detected_from_suffix() {
        assert_eq!(ArchiveFormat::from_name("zig.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_name("zig.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("zig.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("zig.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_name("zig.7z"), None);
    }

    #[test]
    fn tar_gz_strips_wrapping_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, WRAPPED);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("zig").is_file());
        assert!(dest.join("lib/std/std.zig").is_file());
        assert!(!dest.join("zig-linux-x86_64-0.12.0").exists());
    }

    #[test]
    fn tar_xz_strips_wrapping_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.tar.xz");
        let dest = temp.path().join("out");
        write_tar_xz(&archive, WRAPPED);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("zig").is_file());
        assert!(dest.join("lib/std/std.zig").is_file());
    }

    #[test]
    fn zip_strips_wrapping_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.zip");
        let dest = temp.path().join("out");
        write_zip(&archive, WRAPPED);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("zig").is_file());
        assert!(dest.join("lib/std/std.zig").is_file());
    }

    #[test]
    fn flat_archive_preserved() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("flat.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, &[("zig", b"bin"), ("LICENSE", b"MIT")]);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("zig").is_file());
        assert!(dest.join("LICENSE").is_file());
    }

    #[test]
    fn single_flat_file_not_stripped() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("single.zip");
        let dest = temp.path().join("out");
        write_zip(&archive, &[("zig", b"bin")]);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("zig").is_file());
    }

    #[test]
    fn multiple_roots_preserved() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("two.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, &[("a/zig", b"bin"), ("b/doc", b"doc")]);

        extract_archive(&archive, &dest).expect("Should extract");

        assert!(dest.join("a/zig").is_file());
        assert!(dest.join("b/doc").is_file());
    }

    #[test]
    fn zip_with_parent_reference_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        let dest = temp.path().join("out");
        write_zip(&archive, &[("../escape.txt", b"pwned")]);

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn unsupported_format_rejected_before_extraction() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.7z");
        std::fs::write(&archive, b"not an archive").unwrap();
        let dest = temp.path().join("out");

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::UnsupportedArchive { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn corrupt_tar_gz_is_archive_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract_archive(&archive, &temp.path().join("out")).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
    }

    #[test]
    fn empty_tar_gz_extracts_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("empty.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, &[]);

        extract_archive(&archive, &dest).expect("Should extract");

        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_restored() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.zip");
        let dest = temp.path().join("out");
        write_zip(&archive, WRAPPED);

        extract_archive(&archive, &dest).expect("Should extract");

        let mode = std::fs::metadata(dest.join("zig")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn symlink_to_absolute_path_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        let archive = temp.path().join("evil.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::File("zig-x/zig", b"bin"),
                TarEntry::Symlink("zig-x/lib", outside.to_str().unwrap()),
                TarEntry::File("zig-x/lib/pwned", b"pwned"),
            ],
        );

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
        assert!(!outside.join("pwned").exists());
        assert!(!dest.join("zig").exists());
    }

    #[test]
    fn symlink_climbing_out_of_destination_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        let archive = temp.path().join("evil.tar.gz");
        let dest = temp.path().join("out");
        // Inside the archive root, but outside once `zig-x` is stripped.
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::Symlink("zig-x/lib", "../outside"),
                TarEntry::File("zig-x/lib/pwned", b"pwned"),
            ],
        );

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
        assert!(!outside.join("pwned").exists());
    }

    #[test]
    fn symlink_with_parent_after_name_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::File("zig-x/zig", b"bin"),
                TarEntry::Symlink("zig-x/doc/up", "sub/../../.."),
            ],
        );

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
    }

    #[test]
    fn hard_link_outside_archive_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::File("zig-x/zig", b"bin"),
                TarEntry::HardLink("zig-x/passwd", "../../etc/passwd"),
            ],
        );

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
        assert!(!dest.join("passwd").exists());
    }

    #[cfg(unix)]
    #[test]
    fn write_through_extracted_symlink_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.tar.gz");
        let dest = temp.path().join("out");
        // The link itself stays inside, the later write must not follow it.
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::File("zig-x/zig", b"bin"),
                TarEntry::Symlink("zig-x/lib", "."),
                TarEntry::File("zig-x/lib/zig", b"replaced"),
            ],
        );

        let err = extract_archive(&archive, &dest).unwrap_err();

        assert!(matches!(err, ZvmError::Archive { .. }));
        assert_eq!(std::fs::read(dest.join("zig")).unwrap(), b"bin");
    }

    #[cfg(unix)]
    #[test]
    fn links_inside_destination_extracted() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("zig.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz_with_links(
            &archive,
            &[
                TarEntry::File("zig-x/zig", b"bin"),
                TarEntry::File("zig-x/lib/std/std.zig", b"std"),
                TarEntry::Symlink("zig-x/doc/std", "../lib/std"),
                TarEntry::HardLink("zig-x/bin/zig", "zig-x/zig"),
            ],
        );

        extract_archive(&archive, &dest).expect("Should extract");

        assert_eq!(std::fs::read(dest.join("doc/std/std.zig")).unwrap(), b"std");
        assert_eq!(std::fs::read(dest.join("bin/zig")).unwrap(), b"bin");
        let link = std::fs::read_link(dest.join("doc/std")).unwrap();
        assert_eq!(link, PathBuf::from("../lib/std"));
    }

    #[test]
    fn link_resolution_stays_below_base() {
        assert_eq!(
            resolve_within(Path::new("doc"), Path::new("../lib/std")),
            Some(PathBuf::from("lib/std"))
        );
        assert_eq!(resolve_within(Path::new(""), Path::new("./zig")), Some(PathBuf::from("zig")));
        assert_eq!(resolve_within(Path::new(""), Path::new("../zig")), None);
        assert_eq!(resolve_within(Path::new("a/b"), Path::new("c/../../x")), None);
    }
}
