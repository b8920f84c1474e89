//! Release manifest lookup against a GitHub-compatible registry API.

use gremllm_schema::{ReleaseManifest, ReleaseTag};
use reqwest::Client;
use thiserror::Error;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Repository that publishes the native library releases.
pub const DEFAULT_REPO: &str = "gremllm/gremllm";

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Release registry returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed release manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// URL of the release selected by `tag`.
pub fn release_url(api_base: &str, repo: &str, tag: &ReleaseTag) -> String {
    format!(
        "{}/repos/{}/releases/{}",
        api_base.trim_end_matches('/'),
        repo.trim_matches('/'),
        tag.api_path()
    )
}

/// Fetch the manifest for one release.
///
/// Exactly one request is made. Retrying is left to the caller so that a
/// failure always maps to a single status code.
pub async fn fetch_manifest(
    client: &Client,
    api_base: &str,
    repo: &str,
    tag: &ReleaseTag,
) -> Result<ReleaseManifest, ReleaseError> {
    let url = release_url(api_base, repo, tag);
    tracing::debug!(%url, "fetching release manifest");

    let response = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ReleaseError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    let manifest: ReleaseManifest = serde_json::from_str(&body)?;
    tracing::debug!(
        tag = %manifest.tag_name,
        assets = manifest.assets.len(),
        "release manifest parsed"
    );
    Ok(manifest)
}
