//! Native library provisioning.
//!
//! Resolve the platform, look up the release, download the matching archive
//! and install the library it contains. The installed file is the only
//! completion marker: when it already exists nothing else happens, not even
//! a network request.

use std::fmt;
use std::path::{Path, PathBuf};

use gremllm_schema::{ArtifactDescriptor, PlatformError, PlatformKey, ReleaseTag};
use reqwest::Client;
use thiserror::Error;

use crate::Reporter;
use crate::io::download::{self, DownloadError};
use crate::io::extract::{self, ExtractError};
use crate::io::release::{self, DEFAULT_API_BASE, DEFAULT_REPO, ReleaseError};

/// Manual-install instructions attached to provisioning failures.
#[derive(Debug, Clone)]
pub struct Remediation {
    repo: String,
    archive_name: String,
    output_name: String,
    output_path: PathBuf,
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "To install manually, download {} from https://github.com/{}/releases, \
             extract {} and place it at {}",
            self.archive_name,
            self.repo,
            self.output_name,
            self.output_path.display()
        )
    }
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Failed to fetch release manifest: {source}\n{hint}")]
    Release {
        #[source]
        source: ReleaseError,
        hint: Remediation,
    },

    #[error(
        "Release {tag} has no asset named {archive} (available: {names})\n{hint}",
        names = .available.join(", ")
    )]
    MissingAsset {
        tag: String,
        archive: String,
        available: Vec<String>,
        hint: Remediation,
    },

    #[error("Failed to download {url}: {source}\n{hint}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
        hint: Remediation,
    },

    #[error("Failed to install native library: {source}\n{hint}")]
    Install {
        #[source]
        source: ExtractError,
        hint: Remediation,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where to fetch from and where to install to.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// `owner/name` of the repository publishing releases.
    pub repo: String,
    /// Release to install.
    pub release: ReleaseTag,
    /// Registry API root (GitHub-compatible).
    pub api_base: String,
    /// Directory the library is installed into.
    pub install_dir: PathBuf,
    /// Platform to install for.
    pub platform: PlatformKey,
}

impl ProvisionOptions {
    /// Defaults for the running machine: latest release into `~/.gremllm/bin`.
    pub fn for_current_platform() -> Result<Self, ProvisionError> {
        Ok(Self {
            repo: DEFAULT_REPO.to_string(),
            release: ReleaseTag::Latest,
            api_base: DEFAULT_API_BASE.to_string(),
            install_dir: crate::paths::bin_path(),
            platform: PlatformKey::current()?,
        })
    }

    /// Final path of the installed library for `descriptor`.
    pub fn output_path(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.install_dir.join(descriptor.canonical_output_name)
    }

    fn remediation(&self, descriptor: &ArtifactDescriptor) -> Remediation {
        Remediation {
            repo: self.repo.clone(),
            archive_name: descriptor.archive_name.to_string(),
            output_name: descriptor.canonical_output_name.to_string(),
            output_path: self.output_path(descriptor),
        }
    }
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The library was already present; nothing was fetched.
    AlreadyInstalled(PathBuf),
    /// The library was downloaded and installed.
    Installed {
        /// Install location.
        path: PathBuf,
        /// Release tag the library came from.
        tag: String,
    },
}

impl ProvisionOutcome {
    /// Location of the installed library.
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyInstalled(path) | Self::Installed { path, .. } => path,
        }
    }
}

/// Install the native library described by `options`.
///
/// `client` must not follow redirects on its own; build it with
/// [`download::download_client`].
pub async fn provision<R: Reporter + ?Sized>(
    client: &Client,
    options: &ProvisionOptions,
    reporter: &R,
) -> Result<ProvisionOutcome, ProvisionError> {
    let descriptor = options.platform.descriptor()?;
    let output = options.output_path(descriptor);

    if output.exists() {
        tracing::debug!(path = %output.display(), "native library already installed");
        reporter.info(&format!("Already installed at {}", output.display()));
        return Ok(ProvisionOutcome::AlreadyInstalled(output));
    }

    let hint = options.remediation(descriptor);

    reporter.section(&format!("Fetching release ({})", options.release));
    let manifest = release::fetch_manifest(client, &options.api_base, &options.repo, &options.release)
        .await
        .map_err(|source| ProvisionError::Release {
            source,
            hint: hint.clone(),
        })?;

    let Some(asset) = manifest.find_asset(descriptor.archive_name) else {
        return Err(ProvisionError::MissingAsset {
            tag: manifest.tag_name.clone(),
            archive: descriptor.archive_name.to_string(),
            available: manifest
                .asset_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            hint,
        });
    };

    reporter.section(&format!("Downloading {} {}", asset.name, manifest.tag_name));
    tokio::fs::create_dir_all(&options.install_dir).await?;
    let archive_path = options
        .install_dir
        .join(format!(".{}.download", descriptor.archive_name));

    download::download(client, &asset.browser_download_url, &archive_path, reporter)
        .await
        .map_err(|source| ProvisionError::Download {
            url: asset.browser_download_url.clone(),
            source,
            hint: hint.clone(),
        })?;

    reporter.section("Installing");
    let format = descriptor.archive_format;
    let os = options.platform.os;
    let output_clone = output.clone();
    tokio::task::spawn_blocking(move || extract::install(&archive_path, format, &output_clone, os))
        .await
        .map_err(std::io::Error::other)?
        .map_err(|source| ProvisionError::Install { source, hint })?;

    reporter.success(&format!(
        "Installed {} {} to {}",
        descriptor.canonical_output_name,
        manifest.tag_name,
        output.display()
    ));

    Ok(ProvisionOutcome::Installed {
        path: output,
        tag: manifest.tag_name,
    })
}
