//! Serve Markdown versions of HTML pages on request.
//!
//! Any page requested with `?gremllm` is fetched again, without the flag,
//! and returned as Markdown. Stage 1 ([`detect`]) runs in front of routing
//! and rewrites such requests onto an internal route; stage 2 ([`invoke`])
//! fetches the page and runs the native conversion.

pub mod detect;
pub mod invoke;
pub mod state;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

pub use detect::{CONVERT_ROUTE, DEFAULT_SCHEME, Detection, TARGET_HEADER, TRIGGER_PARAM};
pub use invoke::HandoffError;
pub use state::AppState;

/// Wrap `site` with both handoff stages.
///
/// Requests without the trigger reach `site` unchanged.
pub fn router(state: AppState, site: Router) -> Router {
    let inner = Router::new()
        .route(CONVERT_ROUTE, get(invoke::convert))
        .with_state(state.clone())
        .merge(site);

    // The outer router has no routes of its own so the middleware sees
    // every request before `inner` matches on the rewritten URI.
    Router::new()
        .fallback_service(inner)
        .layer(axum::middleware::from_fn_with_state(state, detect::handoff))
}

/// Serve `app` until ctrl-c.
///
/// # Errors
///
/// Returns the listener's I/O error.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
