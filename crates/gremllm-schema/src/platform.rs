//! Supported platform matrix.
//!
//! Every platform a native library is published for has exactly one row in
//! [`PLATFORMS`]. Resolution is a table lookup: a pair that is not in the
//! table is unsupported, there is no fallback row.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::arch::{Arch, Os};

/// Bare name of the native library, as it appears inside release archives.
pub const LIBRARY_NAME: &str = "libgremllm";

/// Errors produced while resolving the running platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The (os, arch) pair has no published native library.
    #[error("Unsupported platform: {os}/{arch}")]
    Unsupported {
        /// Operating system as given by the caller.
        os: String,
        /// Architecture as given by the caller.
        arch: String,
    },
}

/// Compression container a release archive uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (`.tar.gz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zip archive (`.zip`).
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

/// An (operating system, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlatformKey {
    /// Operating system family.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl PlatformKey {
    /// Create a key from already-parsed parts.
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Parse a key from free-form names such as `("darwin", "aarch64")`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] naming both inputs when either
    /// part is unknown.
    pub fn parse(os: &str, arch: &str) -> Result<Self, PlatformError> {
        let unsupported = || PlatformError::Unsupported {
            os: os.to_string(),
            arch: arch.to_string(),
        };
        let parsed_os = os.parse::<Os>().map_err(|_| unsupported())?;
        let parsed_arch = arch.parse::<Arch>().map_err(|_| unsupported())?;
        Ok(Self::new(parsed_os, parsed_arch))
    }

    /// Key for the machine this binary is running on.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] on targets outside the matrix.
    pub fn current() -> Result<Self, PlatformError> {
        Self::parse(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Look up the descriptor for this key.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] when the pair has no row in
    /// [`PLATFORMS`] (e.g. Windows on ARM).
    pub fn descriptor(&self) -> Result<&'static ArtifactDescriptor, PlatformError> {
        PLATFORMS
            .iter()
            .find(|(key, _)| key == self)
            .map(|(_, descriptor)| descriptor)
            .ok_or_else(|| PlatformError::Unsupported {
                os: self.os.to_string(),
                arch: self.arch.to_string(),
            })
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// What to download for a platform and where it lands locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Release asset name (e.g. `libgremllm-linux-amd64.tar.gz`).
    pub archive_name: &'static str,
    /// Version-agnostic file name of the installed library.
    pub canonical_output_name: &'static str,
    /// Container format of the release asset.
    pub archive_format: ArchiveFormat,
}

/// The supported matrix.
pub const PLATFORMS: &[(PlatformKey, ArtifactDescriptor)] = &[
    (
        PlatformKey::new(Os::MacOs, Arch::Arm64),
        ArtifactDescriptor {
            archive_name: "libgremllm-darwin-arm64.tar.gz",
            canonical_output_name: "libgremllm.dylib",
            archive_format: ArchiveFormat::TarGz,
        },
    ),
    (
        PlatformKey::new(Os::MacOs, Arch::X64),
        ArtifactDescriptor {
            archive_name: "libgremllm-darwin-amd64.tar.gz",
            canonical_output_name: "libgremllm.dylib",
            archive_format: ArchiveFormat::TarGz,
        },
    ),
    (
        PlatformKey::new(Os::Linux, Arch::Arm64),
        ArtifactDescriptor {
            archive_name: "libgremllm-linux-arm64.tar.gz",
            canonical_output_name: "libgremllm.so",
            archive_format: ArchiveFormat::TarGz,
        },
    ),
    (
        PlatformKey::new(Os::Linux, Arch::X64),
        ArtifactDescriptor {
            archive_name: "libgremllm-linux-amd64.tar.gz",
            canonical_output_name: "libgremllm.so",
            archive_format: ArchiveFormat::TarGz,
        },
    ),
    (
        PlatformKey::new(Os::Windows, Arch::X64),
        ArtifactDescriptor {
            archive_name: "libgremllm-windows-amd64.zip",
            canonical_output_name: "gremllm.dll",
            archive_format: ArchiveFormat::Zip,
        },
    ),
];

/// Resolve free-form os/arch names to the artifact for that platform.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] for any pair outside [`PLATFORMS`].
///
/// # Example
///
/// ```
/// use gremllm_schema::{resolve, ArchiveFormat};
///
/// let descriptor = resolve("windows", "x86_64").unwrap();
/// assert_eq!(descriptor.archive_format, ArchiveFormat::Zip);
/// assert!(resolve("windows", "aarch64").is_err());
/// ```
pub fn resolve(os: &str, arch: &str) -> Result<&'static ArtifactDescriptor, PlatformError> {
    PlatformKey::parse(os, arch)?.descriptor()
}
