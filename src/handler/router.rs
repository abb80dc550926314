//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route lookup, method
//! validation, dispatch and access logging.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, SERVER, USER_AGENT};
use hyper::{Method, Request, Response};

use crate::config::{AppState, HealthConfig};
use crate::flyer::MeetingState;
use crate::handler::{draw, upload};
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// Where a path is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Flyer(MeetingState),
    Upload,
    Health,
    NotFound,
}

impl Route {
    /// Methods accepted on this route, as sent in `Allow`
    pub const fn allow(self) -> &'static str {
        match self {
            Self::Upload => "GET, HEAD, POST",
            Self::Flyer(_) | Self::Health | Self::NotFound => "GET, HEAD",
        }
    }

    pub fn accepts(self, method: &Method) -> bool {
        match self {
            Self::Upload => matches!(*method, Method::GET | Method::HEAD | Method::POST),
            Self::Flyer(_) | Self::Health => matches!(*method, Method::GET | Method::HEAD),
            Self::NotFound => true,
        }
    }
}

/// Map a request path to its route
pub fn resolve(path: &str, health: &HealthConfig) -> Route {
    match path {
        "/meeting" => Route::Flyer(MeetingState::Normal),
        "/cancelled" => Route::Flyer(MeetingState::Cancelled),
        "/pizza" => Route::Flyer(MeetingState::Pizza),
        "/upload" => Route::Upload,
        p if health.enabled && p == health.path => Route::Health,
        _ => Route::NotFound,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let route = resolve(req.uri().path(), &state.config.health);
    logger::log_debug(&format!("{} {} -> {route:?}", entry.method, entry.path));

    let mut response = dispatch(route, req, &state).await;

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(route: Route, req: Request<B>, state: &Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    if !route.accepts(req.method()) {
        logger::log_warning(&format!(
            "Method not allowed: {} {}",
            req.method(),
            req.uri().path()
        ));
        return http::build_405_response(route.allow());
    }

    let is_head = req.method() == Method::HEAD;
    match route {
        Route::Flyer(meeting_state) => {
            draw::serve_flyer(Arc::clone(state), meeting_state, is_head).await
        }
        Route::Upload => upload::handle_upload(req, state).await,
        Route::Health => http::build_health_response("ok"),
        Route::NotFound => http::build_404_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;
    use hyper::StatusCode;
    use tempfile::TempDir;

    const PASSWORD: &str = "s3cret";
    const BOUNDARY: &str = "XyZboundary";

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn test_state(dir: &TempDir) -> Arc<AppState> {
        let mut cfg = Config::from_defaults();
        cfg.flyer.image_dir = dir.path().display().to_string();
        cfg.logging.access_log = false;
        Arc::new(AppState::new(cfg, PASSWORD.to_string()).unwrap())
    }

    fn upload_body(hidden: Option<&str>, password: &str, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        let mut text = |name: &str, value: &str| {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        };
        text("password", password);
        if let Some(hidden) = hidden {
            text("hidden", hidden);
        }
        if let Some((name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"myFile\"; filename=\"{name}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_upload(state: &Arc<AppState>, body: Vec<u8>) -> (StatusCode, String) {
        let req = Request::post("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        let resp = handle_request(req, Arc::clone(state), peer()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn file_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_route_table() {
        let health = HealthConfig::default();
        assert_eq!(resolve("/meeting", &health), Route::Flyer(MeetingState::Normal));
        assert_eq!(resolve("/cancelled", &health), Route::Flyer(MeetingState::Cancelled));
        assert_eq!(resolve("/pizza", &health), Route::Flyer(MeetingState::Pizza));
        assert_eq!(resolve("/upload", &health), Route::Upload);
        assert_eq!(resolve("/healthz", &health), Route::Health);
        assert_eq!(resolve("/", &health), Route::NotFound);
        assert_eq!(resolve("/meeting/extra", &health), Route::NotFound);
    }

    #[test]
    fn test_health_can_be_disabled() {
        let health = HealthConfig {
            enabled: false,
            path: "/healthz".to_string(),
        };
        assert_eq!(resolve("/healthz", &health), Route::NotFound);
    }

    #[test]
    fn test_route_methods() {
        let pizza = Route::Flyer(MeetingState::Pizza);
        assert!(pizza.accepts(&Method::GET));
        assert!(pizza.accepts(&Method::HEAD));
        assert!(!pizza.accepts(&Method::POST));
        assert!(Route::Upload.accepts(&Method::POST));
        assert!(!Route::Upload.accepts(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_post_to_flyer_is_405() {
        let dir = TempDir::new().unwrap();
        let req = Request::post("/meeting").body(Full::new(Bytes::new())).unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], "GET, HEAD");
        assert!(resp.headers().contains_key(SERVER));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let dir = TempDir::new().unwrap();
        let req = Request::get("/flyer.png").body(Full::new(Bytes::new())).unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let req = Request::get("/healthz").body(Full::new(Bytes::new())).unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_get_upload_serves_form() {
        let dir = TempDir::new().unwrap();
        let req = Request::get("/upload").body(Full::new(Bytes::new())).unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], upload::UPLOAD_FORM.as_bytes());
    }

    #[tokio::test]
    async fn test_post_without_hidden_field_returns_form() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let body = upload_body(None, PASSWORD, Some(("a.png", b"png")));
        let (status, page) = post_upload(&state, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page, upload::UPLOAD_FORM);
        assert_eq!(file_count(&dir), 0);
    }

    async fn post_urlencoded(state: &Arc<AppState>, body: &'static [u8]) -> (StatusCode, String) {
        let req = Request::post("/upload")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap();
        let resp = handle_request(req, Arc::clone(state), peer()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_urlencoded_post_reads_fields() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, page) = post_urlencoded(&state, b"password=s3cret").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page, upload::UPLOAD_FORM);

        let (status, page) = post_urlencoded(&state, b"hidden=set&password=wrong").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page, upload::RETRY_PAGE);

        let (status, _) = post_urlencoded(&state, b"hidden=set&password=s3cret").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_post_without_form_body_returns_form() {
        let dir = TempDir::new().unwrap();
        let req = Request::post("/upload")
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(b"hidden=set&password=s3cret")))
            .unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], upload::UPLOAD_FORM.as_bytes());
    }

    #[tokio::test]
    async fn test_wrong_password_prompts_retry_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let body = upload_body(Some("set"), "guess", Some(("a.png", b"png")));
        let (status, page) = post_upload(&state, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page, upload::RETRY_PAGE);
        assert_eq!(file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_valid_upload_written_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let body = upload_body(Some("set"), PASSWORD, Some(("meeple.png", &data)));
        let (status, page) = post_upload(&state, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page, upload::SUCCESS_PAGE);
        assert_eq!(std::fs::read(dir.path().join("meeple.png")).unwrap(), data);
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_conflict() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let first = upload_body(Some("set"), PASSWORD, Some(("dup.png", b"first")));
        assert_eq!(post_upload(&state, first).await.0, StatusCode::OK);

        let second = upload_body(Some("set"), PASSWORD, Some(("dup.png", b"second")));
        let (status, _) = post_upload(&state, second).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(std::fs::read(dir.path().join("dup.png")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_missing_file_field_is_400() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let body = upload_body(Some("set"), PASSWORD, None);
        let (status, _) = post_upload(&state, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unwritable_pool_is_500() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::from_defaults();
        cfg.flyer.image_dir = dir.path().join("gone").display().to_string();
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(cfg, PASSWORD.to_string()).unwrap());

        let body = upload_body(Some("set"), PASSWORD, Some(("x.png", b"x")));
        let (status, _) = post_upload(&state, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_flyer_failure_is_500_not_crash() {
        let dir = TempDir::new().unwrap();
        let req = Request::get("/pizza").body(Full::new(Bytes::new())).unwrap();
        let resp = handle_request(req, test_state(&dir), peer()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
