//! Stage 1: spot the trigger flag and hand the request to the converter.
//!
//! This stage does no I/O. It only decides whether a request asks for
//! Markdown and, if so, rewrites it onto [`CONVERT_ROUTE`] with the public
//! URL of the page carried in [`TARGET_HEADER`].

use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Query parameter that requests conversion.
pub const TRIGGER_PARAM: &str = "gremllm";

/// Internal route served by stage 2.
pub const CONVERT_ROUTE: &str = "/__gremllm/convert";

/// Header that carries the page URL from stage 1 to stage 2.
pub const TARGET_HEADER: &str = "x-gremllm-target";

/// Scheme used when the proxy in front of us does not say.
pub const DEFAULT_SCHEME: &str = "https";

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// What stage 1 decided for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Not a conversion request; serve it normally.
    PassThrough,
    /// Convert the page at `target`.
    Rewrite {
        /// Public URL of the page, without the trigger parameter.
        target: String,
    },
}

/// Inspect a request line and headers.
///
/// The target keeps every query parameter except the trigger, in order.
/// A request without a usable host cannot be rebuilt and passes through.
pub fn detect(uri: &Uri, headers: &HeaderMap, default_scheme: &str) -> Detection {
    let Some(query) = uri.query() else {
        return Detection::PassThrough;
    };
    let Some(kept) = strip_trigger(query) else {
        return Detection::PassThrough;
    };

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    let Some(host) = host.filter(|h| !h.is_empty()) else {
        tracing::debug!(%uri, "conversion requested without a host, passing through");
        return Detection::PassThrough;
    };

    let scheme = forwarded_proto(headers).unwrap_or(default_scheme);
    let mut target = format!("{scheme}://{host}{}", uri.path());
    if !kept.is_empty() {
        target.push('?');
        target.push_str(&kept.join("&"));
    }
    Detection::Rewrite { target }
}

/// Remaining query pairs, or `None` when the trigger is absent.
fn strip_trigger(query: &str) -> Option<Vec<&str>> {
    let mut triggered = false;
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            if key == TRIGGER_PARAM {
                triggered = true;
                false
            } else {
                !pair.is_empty()
            }
        })
        .collect();
    triggered.then_some(kept)
}

/// First hop of `X-Forwarded-Proto`, if it names http or https.
fn forwarded_proto(headers: &HeaderMap) -> Option<&'static str> {
    let value = headers.get(FORWARDED_PROTO)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.eq_ignore_ascii_case("https") {
        Some("https")
    } else if first.eq_ignore_ascii_case("http") {
        Some("http")
    } else {
        None
    }
}

/// Middleware form of [`detect`].
///
/// Must wrap the router rather than a route: the rewrite has to happen
/// before route matching. Any client-supplied [`TARGET_HEADER`] is removed
/// so stage 2 only ever sees targets built here.
pub async fn handoff(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    req.headers_mut().remove(TARGET_HEADER);

    if let Detection::Rewrite { target } =
        detect(req.uri(), req.headers(), &state.default_scheme)
    {
        match HeaderValue::from_str(&target) {
            Ok(value) => {
                tracing::debug!(%target, "rewriting request for conversion");
                req.headers_mut().insert(TARGET_HEADER, value);
                *req.uri_mut() = Uri::from_static(CONVERT_ROUTE);
            }
            Err(_) => {
                tracing::warn!(%target, "conversion target is not a valid header value, passing through");
            }
        }
    }

    next.run(req).await
}
