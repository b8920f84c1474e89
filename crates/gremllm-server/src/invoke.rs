//! Stage 2: fetch the target page and convert it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use thiserror::Error;

use crate::detect::TARGET_HEADER;
use crate::state::AppState;

/// Content type of a successful conversion.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Cache policy of a successful conversion.
pub const CACHE_POLICY: &str = "public, max-age=3600";

/// Reasons stage 2 did not produce Markdown.
#[derive(Error, Debug)]
pub enum HandoffError {
    /// The request did not come through stage 1.
    #[error("Missing {} header", TARGET_HEADER)]
    MissingTarget,

    /// The target header is not an absolute URL.
    #[error("Invalid conversion target '{0}'")]
    InvalidTarget(String),

    /// The page itself answered with a non-success status.
    #[error("Upstream responded with HTTP {0}")]
    Upstream(StatusCode),

    /// The page is not HTML; the content type is attached.
    #[error("Upstream content type '{0}' is not HTML")]
    NotHtml(String),

    /// Anything else. Only logged, never shown to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandoffError {
    /// Status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingTarget | Self::InvalidTarget(_) | Self::NotHtml(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream(status) => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandoffError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            tracing::error!(%detail, "conversion handoff failed");
            return (status, "Internal Server Error").into_response();
        }
        tracing::debug!(error = %self, status = status.as_u16(), "conversion declined");
        (status, self.to_string()).into_response()
    }
}

/// Point `target` at `base`: scheme, host and port come from `base`; path
/// and query stay those of `target`.
pub fn apply_base_override(target: &Url, base: &Url) -> Url {
    let mut rewritten = base.clone();
    rewritten.set_path(target.path());
    rewritten.set_query(target.query());
    rewritten
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Handler for [`crate::detect::CONVERT_ROUTE`].
///
/// # Errors
///
/// See [`HandoffError`]; each variant maps to its own status code.
pub async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HandoffError> {
    let raw = headers
        .get(TARGET_HEADER)
        .ok_or(HandoffError::MissingTarget)?;
    let raw = raw.to_str().map_err(|_| {
        HandoffError::InvalidTarget(String::from_utf8_lossy(raw.as_bytes()).into_owned())
    })?;
    let mut target = Url::parse(raw).map_err(|_| HandoffError::InvalidTarget(raw.to_string()))?;
    if let Some(base) = &state.config.internal_base_url {
        target = apply_base_override(&target, base);
    }

    let user_agent = headers
        .get(USER_AGENT)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(gremllm_core::USER_AGENT));

    tracing::debug!(%target, "fetching page for conversion");
    let response = state
        .client
        .get(target.clone())
        .header(USER_AGENT, user_agent)
        .send()
        .await
        .map_err(|e| HandoffError::Internal(format!("fetching {target}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HandoffError::Upstream(status));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_html(&content_type) {
        return Err(HandoffError::NotHtml(content_type));
    }

    let html = response
        .text()
        .await
        .map_err(|e| HandoffError::Internal(format!("reading {target}: {e}")))?;

    let converter = Arc::clone(&state.converter);
    let config = Arc::clone(&state.config);
    let markdown = tokio::task::spawn_blocking(move || {
        converter.convert(&html, config.elements_to_strip.as_slice())
    })
    .await
    .map_err(|e| HandoffError::Internal(format!("conversion task: {e}")))?;

    tracing::info!(%target, bytes = markdown.len(), "converted page");
    Ok((
        [(CONTENT_TYPE, MARKDOWN_CONTENT_TYPE), (CACHE_CONTROL, CACHE_POLICY)],
        markdown,
    )
        .into_response())
}
