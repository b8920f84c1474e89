//! Operating system and CPU architecture identifiers.

use std::fmt;
use std::str::FromStr;

/// CPU architecture of a native library build.
///
/// Only the two architectures that release archives are published for are
/// representable. Anything else fails to parse, which the resolver surfaces
/// as an unsupported platform.
///
/// # Example
///
/// ```
/// use gremllm_schema::Arch;
///
/// let arch: Arch = "aarch64".parse().unwrap();
/// assert_eq!(arch, Arch::Arm64);
/// assert_eq!(arch.as_str(), "arm64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, Graviton, Ampere).
    Arm64,
    /// 64-bit x86.
    X64,
}

impl Arch {
    /// Platform-style name used in archive names (`arm64` / `x64`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X64 => "x64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// macOS (Darwin).
    MacOs,
    /// Linux with glibc.
    Linux,
    /// Windows.
    Windows,
}

impl Os {
    /// Human-facing name (`macos`, `linux`, `windows`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// Extension of a dynamically loadable library on this OS, without the dot.
    pub fn library_extension(&self) -> &'static str {
        match self {
            Self::MacOs => "dylib",
            Self::Linux => "so",
            Self::Windows => "dll",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "windows" | "win32" => Ok(Self::Windows),
            _ => Err(format!("Unknown operating system: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_aliases() {
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("AMD64".parse::<Arch>().unwrap(), Arch::X64);
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::X64);
        assert!("riscv64".parse::<Arch>().is_err());
    }

    #[test]
    fn test_os_aliases() {
        assert_eq!("darwin".parse::<Os>().unwrap(), Os::MacOs);
        assert_eq!("win32".parse::<Os>().unwrap(), Os::Windows);
        assert!("freebsd".parse::<Os>().is_err());
    }

    #[test]
    fn test_library_extensions() {
        assert_eq!(Os::MacOs.library_extension(), "dylib");
        assert_eq!(Os::Linux.library_extension(), "so");
        assert_eq!(Os::Windows.library_extension(), "dll");
    }
}
