//! Locating and opening the native conversion library.
//!
//! The library is opened at most once per process and the handle lives in a
//! process-wide cell. It is never closed: the exported functions are used
//! until exit.

use std::ffi::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use gremllm_schema::{PlatformError, PlatformKey};
use libloading::Library;
use thiserror::Error;

use crate::config::GremllmConfig;

/// `char* Convert(char* html, char** elementsToStrip, int elementsLen)`
pub type ConvertFn = unsafe extern "C" fn(*const c_char, *const *const c_char, c_int) -> *mut c_char;

/// `void Free(char* ptr)`
pub type FreeFn = unsafe extern "C" fn(*mut c_char);

const CONVERT_SYMBOL: &str = "Convert";
const FREE_SYMBOL: &str = "Free";

static LIBRARY: OnceLock<LibraryHandle> = OnceLock::new();

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Native library not found. Searched:\n{}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to open native library {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Native library {} does not export `{symbol}`: {source}", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The two functions the library exports.
#[derive(Debug, Clone, Copy)]
pub struct NativeApi {
    pub convert: ConvertFn,
    pub free: FreeFn,
}

/// An open library together with its bound entry points.
#[derive(Debug)]
pub struct LibraryHandle {
    path: PathBuf,
    api: NativeApi,
    // Keeps the mapping alive for as long as `api` is reachable.
    _library: Library,
}

impl LibraryHandle {
    /// Open `path` and bind `Convert` and `Free`.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        // SAFETY: opening a library runs its initialisers. The file is either
        // one we provisioned ourselves or an operator-supplied override.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let missing = |symbol: &'static str| {
            let path = path.to_path_buf();
            move |source: libloading::Error| LoadError::MissingSymbol {
                path,
                symbol,
                source,
            }
        };

        // SAFETY: the declared signatures match the library's C exports. The
        // copied function pointers stay valid because `library` is stored
        // next to them and never unloaded.
        let convert = unsafe { library.get::<ConvertFn>(CONVERT_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(missing(CONVERT_SYMBOL))?;
        // SAFETY: as above.
        let free = unsafe { library.get::<FreeFn>(FREE_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(missing(FREE_SYMBOL))?;

        Ok(Self {
            path: path.to_path_buf(),
            api: NativeApi { convert, free },
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn api(&self) -> NativeApi {
        self.api
    }
}

/// Ordered list of places where the library may live.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    candidates: Vec<PathBuf>,
}

impl LibraryLoader {
    /// Search list for the current platform.
    ///
    /// Order: explicit override, the provisioned install directory, next to
    /// the running executable, then the working directory's `bin/`.
    pub fn from_config(config: &GremllmConfig) -> Result<Self, LoadError> {
        let descriptor = PlatformKey::current()?.descriptor()?;
        let file_name = descriptor.canonical_output_name;

        let mut candidates = Vec::new();
        if let Some(path) = &config.library_path {
            candidates.push(path.clone());
        }
        candidates.push(crate::paths::library_path(descriptor));
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join(file_name));
            candidates.push(dir.join("bin").join(file_name));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("bin").join(file_name));
            candidates.push(cwd.join("vendor").join("gremllm").join("bin").join(file_name));
        }

        Ok(Self::with_candidates(candidates))
    }

    /// Loader over an explicit list; duplicates are dropped, order is kept.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for path in candidates {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self { candidates: unique }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists on disk.
    pub fn locate(&self) -> Result<&Path, LoadError> {
        self.candidates
            .iter()
            .find(|p| p.is_file())
            .map(PathBuf::as_path)
            .ok_or_else(|| LoadError::NotFound {
                searched: self.candidates.clone(),
            })
    }

    /// Return the process-wide handle, opening the library on first use.
    ///
    /// Two threads racing on first use may both open the library; whichever
    /// stores first wins and the other handle is dropped.
    pub fn ensure_loaded(&self) -> Result<&'static LibraryHandle, LoadError> {
        if let Some(handle) = LIBRARY.get() {
            return Ok(handle);
        }

        let path = self.locate()?;
        let handle = LibraryHandle::open(path)?;
        tracing::debug!(path = %path.display(), "native library loaded");
        Ok(LIBRARY.get_or_init(|| handle))
    }
}

/// Handle opened by an earlier [`LibraryLoader::ensure_loaded`], if any.
pub fn loaded() -> Option<&'static LibraryHandle> {
    LIBRARY.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_not_found_lists_every_path() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a").join("libgremllm.so");
        let second = dir.path().join("b").join("libgremllm.so");
        let loader = LibraryLoader::with_candidates(vec![first.clone(), second.clone()]);

        let err = loader.locate().unwrap_err();
        let LoadError::NotFound { searched } = &err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert_eq!(searched, &vec![first.clone(), second.clone()]);

        let message = err.to_string();
        assert!(message.contains(&first.display().to_string()));
        assert!(message.contains(&second.display().to_string()));
    }

    #[test]
    fn test_locate_picks_first_existing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.so");
        let present = dir.path().join("present.so");
        let later = dir.path().join("later.so");
        std::fs::write(&present, b"").unwrap();
        std::fs::write(&later, b"").unwrap();

        let loader = LibraryLoader::with_candidates(vec![missing, present.clone(), later]);
        assert_eq!(loader.locate().unwrap(), present.as_path());
    }

    #[test]
    fn test_directories_are_not_candidates() {
        let dir = tempdir().unwrap();
        let as_dir = dir.path().join("libgremllm.so");
        std::fs::create_dir(&as_dir).unwrap();

        let loader = LibraryLoader::with_candidates(vec![as_dir]);
        assert!(matches!(loader.locate(), Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_duplicates_are_removed_in_order() {
        let loader = LibraryLoader::with_candidates(vec![
            PathBuf::from("/x"),
            PathBuf::from("/y"),
            PathBuf::from("/x"),
        ]);
        assert_eq!(
            loader.candidates(),
            &[PathBuf::from("/x"), PathBuf::from("/y")]
        );
    }

    #[test]
    fn test_override_is_searched_first() {
        let config = GremllmConfig {
            library_path: Some(PathBuf::from("/opt/override/libgremllm.so")),
            ..GremllmConfig::default()
        };
        let Ok(loader) = LibraryLoader::from_config(&config) else {
            // Unsupported host platform; nothing to check.
            return;
        };
        assert_eq!(
            loader.candidates()[0],
            PathBuf::from("/opt/override/libgremllm.so")
        );
        assert!(loader.candidates().len() > 1);
    }

    #[test]
    fn test_open_rejects_non_library() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("libgremllm.so");
        std::fs::write(&bogus, b"definitely not a shared object").unwrap();

        let err = LibraryHandle::open(&bogus).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("libgremllm.so"));
    }
}
