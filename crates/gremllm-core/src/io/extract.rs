//! Archive extraction and library installation
//!
//! Handles tar.gz and zip release archives.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use gremllm_schema::{ArchiveFormat, LIBRARY_NAME, Os};
use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error(
        "Expected exactly one native library in the archive, found {count}: [{list}]",
        count = .candidates.len(),
        list = .candidates.join(", ")
    )]
    Ambiguous { candidates: Vec<String> },
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let relative_path: PathBuf = entry
            .path()?
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();

        // unpack_in refuses entries that would escape dest_dir
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                relative_path.display()
            )));
        }

        extracted_files.push(ExtractedFile {
            absolute_path: dest_dir.join(&relative_path),
            relative_path,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            continue;
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract an archive of the given format.
pub fn extract(
    archive_path: &Path,
    format: ArchiveFormat,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
    }
}

/// Whether `path` looks like the native library for `os`.
///
/// Matches the bare library name, the OS's shared-library extension, or
/// `.exe` for Windows builds packaged as executables.
pub fn is_library_candidate(path: &Path, os: Os) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if file_name == LIBRARY_NAME {
        return true;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(os.library_extension()) => true,
        Some(ext) => os == Os::Windows && ext.eq_ignore_ascii_case("exe"),
        None => false,
    }
}

/// Pick the single library payload out of an extraction.
pub fn find_library_payload(
    files: &[ExtractedFile],
    os: Os,
) -> Result<&ExtractedFile, ExtractError> {
    let candidates: Vec<&ExtractedFile> = files
        .iter()
        .filter(|f| is_library_candidate(&f.relative_path, os))
        .collect();

    match candidates.as_slice() {
        [single] => Ok(*single),
        _ => Err(ExtractError::Ambiguous {
            candidates: candidates
                .iter()
                .map(|f| f.relative_path.display().to_string())
                .collect(),
        }),
    }
}

/// Install the native library contained in `archive_path` at `output_path`.
///
/// The archive is unpacked into a private staging directory next to
/// `output_path` so the final move is a same-filesystem rename. The staging
/// directory and the archive itself are removed whether or not installation
/// succeeds.
pub fn install(
    archive_path: &Path,
    format: ArchiveFormat,
    output_path: &Path,
    os: Os,
) -> Result<(), ExtractError> {
    let result = install_from_archive(archive_path, format, output_path, os);

    if let Err(e) = fs::remove_file(archive_path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(archive = %archive_path.display(), error = %e, "failed to remove archive");
        }
    }

    result
}

fn install_from_archive(
    archive_path: &Path,
    format: ArchiveFormat,
    output_path: &Path,
    os: Os,
) -> Result<(), ExtractError> {
    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".gremllm-extract-")
        .tempdir_in(parent)?;

    let files = extract(archive_path, format, staging.path())?;
    tracing::debug!(count = files.len(), "archive extracted");

    let payload = find_library_payload(&files, os)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&payload.absolute_path, fs::Permissions::from_mode(0o755))?;
    }

    fs::rename(&payload.absolute_path, output_path)?;
    tracing::info!(
        payload = %payload.relative_path.display(),
        output = %output_path.display(),
        "native library installed"
    );

    Ok(())
}
