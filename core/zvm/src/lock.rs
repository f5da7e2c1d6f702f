//! Advisory lock on the store root.
//!
//! Mutating operations (install, uninstall, switch) hold an exclusive,
//! non-blocking OS lock on `<root>/.lock` for their whole duration. The file
//! also records who holds it so a contending process can say so. Readers do
//! not lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{IoContext, Result, ZvmError};

const LOCK_FILENAME: &str = ".lock";

/// Contents of the lock file while it is held.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
    pub version: u32,
    pub pid: u32,
    pub started_at_unix: u64,
    pub command: String,
    pub store: PathBuf,
}

/// An exclusive lock on a store root, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    lock_path: PathBuf,
}

impl StoreLock {
    /// Acquires the lock for `root` on behalf of `command`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process holds the lock, or `FileSystem`
    /// if the lock file cannot be created or written.
    pub fn acquire(root: &Path, command: &str) -> Result<Self> {
        let lock_path = root.join(LOCK_FILENAME);

        std::fs::create_dir_all(root)
            .io_context(|| format!("failed to create store directory: {}", root.display()))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .io_context(|| format!("failed to open lock file: {}", lock_path.display()))?;

        if let Err(err) = try_lock(&file) {
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(contention_error(&lock_path));
            }
            return Err(ZvmError::io(
                format!("failed to acquire lock: {}", lock_path.display()),
                err,
            ));
        }

        write_metadata(&file, command, root)
            .io_context(|| format!("failed to write lock metadata: {}", lock_path.display()))?;
        debug!(lock = %lock_path.display(), command, "store lock acquired");

        Ok(Self { file, lock_path })
    }

    /// Reads the metadata through the held handle.
    ///
    /// Opening a second handle would fail on Windows, where the lock is
    /// mandatory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or parsed.
    pub fn read_metadata(&self) -> io::Result<LockMetadata> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).map_err(io::Error::other)
    }

    /// Path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn write_metadata(file: &File, command: &str, store: &Path) -> io::Result<()> {
    let metadata = LockMetadata {
        version: 1,
        pid: std::process::id(),
        started_at_unix: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        command: command.to_string(),
        store: store.to_path_buf(),
    };

    file.set_len(0)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(io::Error::other)?;
    writer.flush()
}

fn contention_error(lock_path: &Path) -> ZvmError {
    let holder = std::fs::read_to_string(lock_path)
        .ok()
        .and_then(|contents| serde_json::from_str::<LockMetadata>(&contents).ok())
        .map_or_else(
            || "unknown process (could not read lock metadata)".to_string(),
            |m| {
                format!(
                    "'{}' (PID {}, started at Unix timestamp {})",
                    m.command, m.pid, m.started_at_unix
                )
            },
        );

    ZvmError::Locked {
        holder,
        lock_path: lock_path.to_path_buf(),
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{FlockOperation, flock};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx,
    };

    let handle = file.as_raw_handle() as HANDLE;

    // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized,
    // and the handle stays open for the duration of the call.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(
            handle,
            LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
            0,
            1,
            0,
            &mut overlapped,
        )
    };

    if result == 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let lock = StoreLock::acquire(temp.path(), "test").unwrap();
        assert!(lock.lock_path().exists());
        assert_eq!(lock.lock_path(), temp.path().join(".lock"));
    }

    #[test]
    fn acquire_creates_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("store");
        let _lock = StoreLock::acquire(&root, "test").unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn metadata_names_command_and_pid() {
        let temp = TempDir::new().unwrap();
        let lock = StoreLock::acquire(temp.path(), "install 0.12.0").unwrap();

        let metadata = lock.read_metadata().unwrap();

        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.command, "install 0.12.0");
        assert_eq!(metadata.pid, std::process::id());
        assert_eq!(metadata.store, temp.path());
    }

    #[test]
    fn second_acquire_reports_holder() {
        let temp = TempDir::new().unwrap();
        let _held = StoreLock::acquire(temp.path(), "install 0.12.0").unwrap();

        let err = StoreLock::acquire(temp.path(), "uninstall 0.11.0").unwrap_err();

        match err {
            ZvmError::Locked { holder, lock_path } => {
                assert_eq!(lock_path, temp.path().join(".lock"));
                #[cfg(unix)]
                assert!(holder.contains("install 0.12.0"), "holder was {holder}");
                #[cfg(windows)]
                let _ = holder;
            }
            other => panic!("Expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _lock = StoreLock::acquire(temp.path(), "first").unwrap();
        }

        let lock = StoreLock::acquire(temp.path(), "second").unwrap();
        assert_eq!(lock.read_metadata().unwrap().command, "second");
    }
}
