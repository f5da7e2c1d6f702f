//! SHA-256 verification of downloaded archives.
//!
//! The release index publishes a `shasum` next to most artifacts; when it is
//! present the installer checks the downloaded file against it before
//! anything is extracted.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{IoContext, Result, ZvmError};

/// Verifies that a file matches the expected SHA-256 checksum.
///
/// The comparison ignores case and surrounding whitespace in `expected`.
///
/// # Errors
///
/// Returns `FileSystem` if the file cannot be read, or `ChecksumMismatch`
/// if the digest differs.
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let computed = compute_sha256(file_path)?;
    let expected = expected.trim().to_ascii_lowercase();

    if computed != expected {
        return Err(ZvmError::ChecksumMismatch {
            expected,
            actual: computed,
        });
    }

    Ok(())
}

/// Computes the SHA-256 hash of a file as a lowercase hex string.
///
/// # Errors
///
/// Returns `FileSystem` if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path)
        .io_context(|| format!("failed to open file for checksum: {}", file_path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .io_context(|| format!("failed to read file for checksum: {}", file_path.display()))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
