//! `gremllm serve`
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use gremllm_core::config::{INTERNAL_BASE_URL_ENV, parse_base_url};
use gremllm_core::{Converter, GremllmConfig, LibraryLoader, Reporter};
use gremllm_server::AppState;

use crate::ui::Output;

/// Host both handoff stages.
///
/// Requests without `?gremllm` get a 404 pointing at the flag; there is no
/// site behind this server. Pages are always fetched from
/// `internal_base_url`, so a client-chosen `Host` only picks the path.
pub async fn serve(
    mut config: GremllmConfig,
    listen: SocketAddr,
    internal_base_url: String,
    default_scheme: String,
) -> Result<()> {
    let output = Output::new();

    let base = parse_base_url(INTERNAL_BASE_URL_ENV, &internal_base_url)?;
    output.info(&format!("Fetching pages from {base}"));
    config.internal_base_url = Some(base);

    let converter = Converter::new(LibraryLoader::from_config(&config)?);
    match converter.ensure_loaded() {
        Ok(()) => {
            if let Some(handle) = gremllm_core::native::loaded() {
                output.info(&format!("Native library {}", handle.path().display()));
            }
        }
        Err(e) => output.warning(&format!(
            "{e}\nPages will be returned unconverted until `gremllm install` has run."
        )),
    }

    let state = AppState::new(converter, config)
        .context("Failed to build HTTP client")?
        .with_default_scheme(default_scheme);
    let site = Router::new().fallback(|| async {
        (
            StatusCode::NOT_FOUND,
            "Not found. Append ?gremllm to a page URL to get its Markdown.",
        )
    });
    let app = gremllm_server::router(state, site);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    output.success(&format!("Listening on http://{listen}"));
    gremllm_server::serve(listener, app).await?;
    Ok(())
}
