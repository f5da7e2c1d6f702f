//! POSIX shell scripts holding the persisted search path.
//!
//! Each scope owns one script containing a single `export PATH="…"` line.
//! Inside it, the literal segment `$PATH` stands for the inherited value, so
//! a missing script reads as just `$PATH`:
//!
//! ```bash
//! # zvm toolchain search path
//! export PATH="/home/u/.zvm/versions/0.12.0:$PATH"
//! ```
//!
//! The user script is sourced from the user's bash or zsh profile through a
//! hook line appended once, marked with `# zvm toolchain`.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{PathScope, PathVariable};
use crate::errors::{Result, ZvmError};

/// Marker comment identifying the profile hook.
const HOOK_MARKER: &str = "# zvm toolchain";

/// First line of every managed script.
const SCRIPT_HEADER: &str = "# zvm toolchain search path; rewritten by `zvm use`";

/// Inherited-value placeholder inside the script.
const INHERITED: &str = "$PATH";

/// Default machine-wide script location.
const MACHINE_SCRIPT: &str = "/etc/profile.d/zvm.sh";

/// Supported login shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    /// Detects the user's shell from the SHELL environment variable.
    ///
    /// Returns `None` if the shell cannot be determined or is not supported.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let shell_path = std::env::var("SHELL").ok()?;
        Self::from_path(&shell_path)
    }

    /// Parses a shell from a path string (e.g., "/bin/bash").
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let shell_name = Path::new(path).file_name()?.to_str()?;
        match shell_name {
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            _ => None,
        }
    }

    /// Returns the profile files to check for this shell.
    #[must_use]
    pub fn profile_candidates(self, home_dir: &Path) -> Vec<PathBuf> {
        match self {
            Self::Bash => vec![home_dir.join(".bashrc"), home_dir.join(".bash_profile")],
            Self::Zsh => vec![home_dir.join(".zshrc")],
        }
    }
}

/// Result of installing the profile hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookStatus {
    /// The hook was appended to the profile.
    Added { profile: PathBuf },
    /// The profile already sources the script.
    AlreadyConfigured { profile: PathBuf },
    /// None of the shell's profile files exist.
    NoProfileFound,
    /// The login shell is unknown or unsupported.
    ShellNotDetected,
}

/// [`PathVariable`] backed by POSIX scripts.
#[derive(Debug, Clone)]
pub struct ProfilePathVariable {
    user_script: PathBuf,
    machine_script: PathBuf,
    home: Option<PathBuf>,
    shell: Option<Shell>,
}

impl ProfilePathVariable {
    /// Uses `<store_root>/env` for the user scope and the system profile
    /// directory for the machine scope.
    #[must_use]
    pub fn new(store_root: &Path) -> Self {
        Self {
            user_script: store_root.join("env"),
            machine_script: PathBuf::from(MACHINE_SCRIPT),
            home: dirs::home_dir(),
            shell: Shell::detect(),
        }
    }

    /// Overrides the machine-wide script location.
    #[must_use]
    pub fn with_machine_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.machine_script = path.into();
        self
    }

    /// Overrides the home directory and shell used for the profile hook.
    #[must_use]
    pub fn with_profile(mut self, home: Option<PathBuf>, shell: Option<Shell>) -> Self {
        self.home = home;
        self.shell = shell;
        self
    }

    /// Script holding the value for `scope`.
    #[must_use]
    pub fn script_path(&self, scope: PathScope) -> &Path {
        match scope {
            PathScope::User => &self.user_script,
            PathScope::Machine => &self.machine_script,
        }
    }

    /// Makes the user's shell profile source the user script.
    ///
    /// # Errors
    ///
    /// Returns `FileSystem` if the profile cannot be read or appended to.
    pub fn ensure_profile_hook(&self) -> Result<HookStatus> {
        let Some(shell) = self.shell else {
            return Ok(HookStatus::ShellNotDetected);
        };
        let Some(home) = &self.home else {
            return Ok(HookStatus::NoProfileFound);
        };
        let Some(profile) = shell.profile_candidates(home).into_iter().find(|p| p.exists()) else {
            return Ok(HookStatus::NoProfileFound);
        };

        let content = std::fs::read_to_string(&profile)
            .map_err(|e| ZvmError::io(format!("failed to read profile: {}", profile.display()), e))?;
        if content.contains(HOOK_MARKER) {
            return Ok(HookStatus::AlreadyConfigured { profile });
        }

        let script = escape_segment(&self.user_script.to_string_lossy());
        let hook = format!("\n{HOOK_MARKER}\n[ -f \"{script}\" ] && . \"{script}\"\n");
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&profile)
            .map_err(|e| {
                ZvmError::io(format!("failed to open profile for writing: {}", profile.display()), e)
            })?;
        file.write_all(hook.as_bytes())
            .map_err(|e| ZvmError::io(format!("failed to write to profile: {}", profile.display()), e))?;

        Ok(HookStatus::Added { profile })
    }
}

impl PathVariable for ProfilePathVariable {
    fn read(&self, scope: PathScope) -> Result<String> {
        let path = self.script_path(scope);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(INHERITED.to_string()),
            Err(e) => return Err(map_io(scope, path, "read", e)),
        };

        let Some(raw) = content.lines().find_map(|line| {
            line.trim()
                .strip_prefix("export PATH=\"")
                .and_then(|rest| rest.strip_suffix('"'))
        }) else {
            debug!(script = %path.display(), "no export line; treating as inherited PATH");
            return Ok(INHERITED.to_string());
        };

        Ok(raw
            .split(':')
            .map(|segment| {
                if segment == INHERITED {
                    segment.to_string()
                } else {
                    unescape_segment(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(":"))
    }

    fn write(&self, scope: PathScope, value: &str) -> Result<()> {
        let path = self.script_path(scope);
        let exported = value
            .split(':')
            .map(|segment| {
                if segment == INHERITED {
                    segment.to_string()
                } else {
                    escape_segment(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(":");
        let content = format!("{SCRIPT_HEADER}\nexport PATH=\"{exported}\"\n");

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| map_io(scope, dir, "create", e))?;
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| map_io(scope, dir, "write", e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| map_io(scope, path, "write", e))?;
        set_readable(temp.path()).map_err(|e| map_io(scope, path, "write", e))?;
        temp.persist(path)
            .map_err(|e| map_io(scope, path, "replace", e.error))?;

        if scope == PathScope::User {
            match self.ensure_profile_hook() {
                Ok(HookStatus::Added { profile }) => {
                    info!(profile = %profile.display(), "added zvm hook to shell profile");
                }
                Ok(HookStatus::NoProfileFound | HookStatus::ShellNotDetected) => {
                    debug!("no shell profile to hook; the env script must be sourced manually");
                }
                Ok(HookStatus::AlreadyConfigured { .. }) => {}
                Err(e) => warn!(error = %e, "could not update shell profile"),
            }
        }

        Ok(())
    }

    fn location(&self, scope: PathScope) -> String {
        self.script_path(scope).display().to_string()
    }

    fn activation_hint(&self, scope: PathScope) -> Option<String> {
        let script = escape_segment(&self.script_path(scope).to_string_lossy());
        Some(format!(". \"{script}\"  (or start a new shell)"))
    }
}

/// Escapes characters that are special inside double quotes.
fn escape_segment(segment: &str) -> String {
    segment
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('`', "\\`")
        .replace('"', "\\\"")
}

fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '$' | '`' | '"')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Scripts under `/etc/profile.d` are sourced by every user.
fn set_readable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

fn map_io(scope: PathScope, path: &Path, action: &str, err: std::io::Error) -> ZvmError {
    if err.kind() == ErrorKind::PermissionDenied {
        ZvmError::Privilege {
            scope,
            message: format!("cannot {action} {}", path.display()),
        }
    } else {
        ZvmError::io(format!("failed to {action} {}", path.display()), err)
    }
}
