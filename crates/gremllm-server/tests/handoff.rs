//! End-to-end handoff tests against a mock upstream.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char, c_int};
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use gremllm_core::native::{ConvertFn, NativeApi};
use gremllm_core::{Converter, GremllmConfig};
use gremllm_server::{AppState, CONVERT_ROUTE, TARGET_HEADER, router};
use mockito::{Matcher, Server};
use reqwest::Url;
use tower::ServiceExt;

static JSON_CASE_CALLS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn prefix_convert(
    html: *const c_char,
    _elements: *const *const c_char,
    _len: c_int,
) -> *mut c_char {
    // SAFETY: the bridge always passes a NUL-terminated string.
    let html = unsafe { CStr::from_ptr(html) }.to_string_lossy();
    CString::new(format!("markdown:{html}")).unwrap().into_raw()
}

unsafe extern "C" fn counted_convert(
    html: *const c_char,
    elements: *const *const c_char,
    len: c_int,
) -> *mut c_char {
    JSON_CASE_CALLS.fetch_add(1, Ordering::SeqCst);
    // SAFETY: forwarding the bridge's own arguments.
    unsafe { prefix_convert(html, elements, len) }
}

unsafe extern "C" fn release(ptr: *mut c_char) {
    // SAFETY: every buffer above comes from `CString::into_raw`.
    drop(unsafe { CString::from_raw(ptr) });
}

fn app(config: GremllmConfig, convert: ConvertFn) -> Router {
    let converter = Converter::from_api(NativeApi {
        convert,
        free: release,
    });
    let state = AppState::new(converter, config).unwrap();
    let site = Router::new().route("/about", get(|| async { "about page" }));
    router(state, site)
}

fn via_internal(server: &Server) -> GremllmConfig {
    GremllmConfig {
        internal_base_url: Some(Url::parse(&server.url()).unwrap()),
        ..GremllmConfig::default()
    }
}

fn get_request(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_plain_request_passes_through() {
    let app = app(GremllmConfig::default(), prefix_convert);

    let response = app
        .oneshot(get_request("/about", "example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "about page");
}

#[tokio::test]
async fn test_trigger_converts_page() {
    let mut server = Server::new_async().await;
    let upstream = server
        .mock("GET", "/about")
        .match_query(Matcher::Exact("lang=en".into()))
        .match_header("user-agent", "test-agent/1.0")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<h1>About</h1>")
        .create_async()
        .await;

    let app = app(via_internal(&server), prefix_convert);
    let request = Request::builder()
        .uri("/about?gremllm=1&lang=en")
        .header(header::HOST, "public.example")
        .header(header::USER_AGENT, "test-agent/1.0")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    upstream.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/markdown; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600"
    );
    assert_eq!(body_string(response).await, "markdown:<h1>About</h1>");
}

#[tokio::test]
async fn test_forwarded_proto_reaches_host() {
    let mut server = Server::new_async().await;
    let upstream = server
        .mock("GET", "/docs")
        .match_header("user-agent", Matcher::Regex("^gremllm/".into()))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>docs</p>")
        .create_async()
        .await;

    let app = app(GremllmConfig::default(), prefix_convert);
    let request = Request::builder()
        .uri("/docs?gremllm")
        .header(header::HOST, server.host_with_port())
        .header("x-forwarded-proto", "http")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    upstream.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "markdown:<p>docs</p>");
}

#[tokio::test]
async fn test_configured_origin_wins_over_foreign_host() {
    let mut origin = Server::new_async().await;
    let mut foreign = Server::new_async().await;
    let fetched = origin
        .mock("GET", "/docs")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>docs</p>")
        .expect(1)
        .create_async()
        .await;
    let bypassed = foreign
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = app(via_internal(&origin), prefix_convert);
    let request = Request::builder()
        .uri("/docs?gremllm")
        .header(header::HOST, foreign.host_with_port())
        .header("x-forwarded-proto", "http")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "markdown:<p>docs</p>");
    fetched.assert_async().await;
    bypassed.assert_async().await;
}

#[tokio::test]
async fn test_json_upstream_is_rejected_without_conversion() {
    let mut server = Server::new_async().await;
    let _upstream = server
        .mock("GET", "/api")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let app = app(via_internal(&server), counted_convert);
    let response = app
        .oneshot(get_request("/api?gremllm=1", "public.example"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(JSON_CASE_CALLS.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_status_is_forwarded() {
    let mut server = Server::new_async().await;
    let _upstream = server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let app = app(via_internal(&server), prefix_convert);
    let response = app
        .oneshot(get_request("/gone?gremllm=1", "public.example"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_direct_call_without_stage_one_is_rejected() {
    let app = app(GremllmConfig::default(), prefix_convert);
    let request = Request::builder()
        .uri(CONVERT_ROUTE)
        .header(header::HOST, "public.example")
        .header(TARGET_HEADER, "http://169.254.169.254/latest/meta-data")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_upstream_is_generic_500() {
    let config = GremllmConfig {
        internal_base_url: Some(Url::parse("http://127.0.0.1:1").unwrap()),
        ..GremllmConfig::default()
    };
    let app = app(config, prefix_convert);

    let response = app
        .oneshot(get_request("/about?gremllm=1", "public.example"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Internal Server Error");
}
