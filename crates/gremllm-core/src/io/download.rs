//! Streaming HTTP download with explicit redirect handling.
//!
//! Release assets are served through one or more redirects (registry → CDN).
//! The client used here must not follow redirects on its own: the hops are
//! walked manually so that a redirect without a `Location` header is reported
//! instead of silently treated as the final response.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;

/// Maximum number of redirect hops followed for a single download.
pub const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("Download of {url} failed with HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Redirect (HTTP {status}) from {url} has no Location header")]
    MissingLocation { status: u16, url: String },

    #[error("Redirect from {url} points to an invalid location '{location}'")]
    InvalidLocation { url: String, location: String },

    #[error("Too many redirects (more than {}) starting at {url}", MAX_REDIRECTS)]
    TooManyRedirects { url: String },
}

/// Build an HTTP client suitable for [`download`]: redirects disabled,
/// optional overall request timeout.
pub fn download_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(crate::USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Issue GET requests until a non-redirect response arrives.
async fn resolve_redirects(client: &Client, url: &str) -> Result<Response, DownloadError> {
    let mut current = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;

    for _ in 0..=MAX_REDIRECTS {
        let response = client
            .get(current.clone())
            .header(USER_AGENT, crate::USER_AGENT)
            .send()
            .await?;
        let status = response.status();

        if is_followed_redirect(status) {
            let location = response.headers().get(LOCATION).ok_or_else(|| {
                DownloadError::MissingLocation {
                    status: status.as_u16(),
                    url: current.to_string(),
                }
            })?;
            let location = location
                .to_str()
                .map_err(|_| DownloadError::InvalidLocation {
                    url: current.to_string(),
                    location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
                })?;
            // Relative locations resolve against the URL that issued them.
            let next = current
                .join(location)
                .map_err(|_| DownloadError::InvalidLocation {
                    url: current.to_string(),
                    location: location.to_string(),
                })?;
            tracing::debug!(from = %current, to = %next, status = status.as_u16(), "following redirect");
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                url: current.to_string(),
            });
        }
        return Ok(response);
    }

    Err(DownloadError::TooManyRedirects {
        url: url.to_string(),
    })
}

/// Download `url` to `dest`, following redirects.
///
/// Returns the number of bytes written. If anything fails after `dest` was
/// created, the partial file is removed before the error is returned.
pub async fn download<R: Reporter + ?Sized>(
    client: &Client,
    url: &str,
    dest: &Path,
    reporter: &R,
) -> Result<u64, DownloadError> {
    let response = resolve_redirects(client, url).await?;
    let total = response.content_length();
    let name = crate::paths::filename_from_url(url);

    let mut file = File::create(dest).await?;
    match stream_to_file(response, &mut file, name, total, reporter).await {
        Ok(written) => {
            tracing::debug!(%url, dest = %dest.display(), bytes = written, "download complete");
            Ok(written)
        }
        Err(e) => {
            drop(file);
            tokio::fs::remove_file(dest).await.ok();
            Err(e)
        }
    }
}

async fn stream_to_file<R: Reporter + ?Sized>(
    response: Response,
    file: &mut File,
    name: &str,
    total: Option<u64>,
    reporter: &R,
) -> Result<u64, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    reporter.downloading(name, 0, total);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        reporter.downloading(name, downloaded, total);
    }
    file.flush().await?;

    Ok(downloaded)
}
