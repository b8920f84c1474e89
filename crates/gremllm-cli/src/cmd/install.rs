//! `gremllm install`
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gremllm_core::Reporter;
use gremllm_core::io::download::download_client;
use gremllm_core::provision::{self, ProvisionOptions, ProvisionOutcome};
use gremllm_schema::ReleaseTag;

use crate::ui::Output;

/// Install the native library for the running machine.
pub async fn install(
    release: ReleaseTag,
    repo: String,
    api_base: String,
    dir: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let output = Output::new();

    let mut options = ProvisionOptions::for_current_platform()?;
    options.release = release;
    options.repo = repo;
    options.api_base = api_base;
    if let Some(dir) = dir {
        options.install_dir = dir;
    }

    // A failed reinstall puts the previous library back.
    let previous = if force {
        set_aside(&options.output_path(options.platform.descriptor()?))?
    } else {
        None
    };

    let client = download_client(None).context("Failed to build HTTP client")?;
    let outcome = provision::provision(&client, &options, &output).await;
    if let Some((backup, original)) = previous {
        if outcome.is_ok() {
            std::fs::remove_file(&backup)
                .with_context(|| format!("Failed to remove {}", backup.display()))?;
        } else {
            std::fs::rename(&backup, &original)
                .with_context(|| format!("Failed to restore {}", original.display()))?;
            output.info(&format!("Kept existing {}", original.display()));
        }
    }

    match outcome? {
        ProvisionOutcome::AlreadyInstalled(path) => {
            output.success(&format!(
                "Native library already installed at {} (use --force to reinstall)",
                path.display()
            ));
        }
        ProvisionOutcome::Installed { path, tag } => {
            output.success(&format!("Installed {tag} to {}", path.display()));
        }
    }
    Ok(())
}

/// Rename an installed library out of the way, returning `(backup, original)`.
fn set_aside(existing: &Path) -> Result<Option<(PathBuf, PathBuf)>> {
    let Some(name) = existing.file_name().filter(|_| existing.exists()) else {
        return Ok(None);
    };
    let backup = existing.with_file_name(format!(".{}.previous", name.to_string_lossy()));
    std::fs::rename(existing, &backup)
        .with_context(|| format!("Failed to move aside {}", existing.display()))?;
    Ok(Some((backup, existing.to_path_buf())))
}
