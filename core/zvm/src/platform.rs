//! Host platform detection.
//!
//! The release index keys downloads by an architecture-OS tag such as
//! `x86_64-linux` or `aarch64-macos`. This module produces that tag for the
//! running host and knows the per-OS executable and archive conventions.
//!
//! ## Supported Platforms
//!
//! - Architectures: `x86_64`, `aarch64`, `x86`
//! - Operating systems: `linux`, `macos`, `windows`

use std::fmt;

/// Processor architecture as named by the release index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86
    X86_64,
    /// 64-bit ARM
    Aarch64,
    /// 32-bit x86
    X86,
}

/// Operating system as named by the release index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux
    Linux,
    /// macOS
    Macos,
    /// Windows
    Windows,
}

/// An architecture-OS pair identifying which artifact to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// The processor architecture.
    pub arch: Arch,
    /// The operating system.
    pub os: Os,
}

impl Platform {
    /// Creates a platform from its parts.
    #[must_use]
    pub const fn new(arch: Arch, os: Os) -> Self {
        Self { arch, os }
    }

    /// Detects the current platform from compile-time configuration.
    ///
    /// Unknown architectures map to `x86_64` and unknown operating systems to
    /// `linux`, so the tag is always well formed; the catalog then reports
    /// `UnsupportedArchitecture` for releases that lack it.
    #[must_use]
    pub fn detect() -> Self {
        let arch = match std::env::consts::ARCH {
            "aarch64" => Arch::Aarch64,
            "x86" => Arch::X86,
            _ => Arch::X86_64,
        };
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Macos,
            _ => Os::Linux,
        };
        Self { arch, os }
    }

    /// Returns the architecture component of the tag.
    #[must_use = "returns the architecture string without side effects"]
    pub fn arch_str(self) -> &'static str {
        match self.arch {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::X86 => "x86",
        }
    }

    /// Returns the OS component of the tag.
    #[must_use = "returns the OS string without side effects"]
    pub fn os_str(self) -> &'static str {
        match self.os {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
        }
    }

    /// Returns the `<arch>-<os>` tag used as the index download key.
    #[must_use = "returns the tag without side effects"]
    pub fn tag(self) -> String {
        format!("{}-{}", self.arch_str(), self.os_str())
    }

    /// Returns the executable file extension for this platform.
    ///
    /// Returns `.exe` on Windows, empty string on Unix platforms.
    #[must_use = "returns the extension string without side effects"]
    pub fn executable_extension(self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }

    /// Returns the archive extension releases use on this platform.
    #[must_use = "returns the extension string without side effects"]
    pub fn archive_extension(self) -> &'static str {
        if self.is_windows() { "zip" } else { "tar.xz" }
    }

    /// Returns whether this platform is Windows.
    #[must_use = "returns platform check result without side effects"]
    pub fn is_windows(self) -> bool {
        self.os == Os::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch_str(), self.os_str())
    }
}
