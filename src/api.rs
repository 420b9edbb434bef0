//! Cashback backend API client.
//!
//! Every backend call goes through [`ApiClient::request`]: it prefixes the
//! configured base URL, JSON-encodes the body, attaches the bearer token,
//! parses the response by content type and turns non-2xx responses into an
//! [`ApiError::Status`] carrying the HTTP status and the parsed body so
//! callers can branch on 401.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API path must start with /: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        data: Value,
    },

    #[error("Unexpected response from backend: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed error body, `Null` for non-HTTP failures.
    pub fn data(&self) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            ApiError::Status { data, .. } => data,
            _ => &NULL,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Message for a non-2xx response: backend `message`, then `error`, then a
/// generic line with the status code.
fn status_message(status: StatusCode, data: &Value) -> String {
    crate::value_str(data, &["message", "error"])
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()))
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Normalise a backend base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
/// - strip a trailing `/api` segment
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Absolute request URL: base URL + `path`, then `segments` as encoded path
/// segments, then the non-empty query parameters.
pub fn build_url(
    base_url: &str,
    path: &str,
    segments: &[&str],
    params: &[(&str, Option<String>)],
) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!("{base_url}{path}"))
        .map_err(|e| ApiError::Transport(format!("Invalid backend URL: {base_url} ({e})")))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("Invalid backend URL: {base_url}")))?
            .pop_if_empty()
            .extend(segments);
    }
    append_query(&mut url, params);
    Ok(url)
}

/// Append the parameters that carry a non-empty value. The URL keeps no
/// trailing `?` when none remain.
pub fn append_query(url: &mut Url, params: &[(&str, Option<String>)]) {
    let mut pairs = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().filter(|s| !s.is_empty()).map(|v| (*k, v)))
        .peekable();
    if pairs.peek().is_none() {
        return;
    }
    let mut qp = url.query_pairs_mut();
    for (k, v) in pairs {
        qp.append_pair(k, v);
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RequestOptions<'a> {
    pub method: Option<Method>,
    pub body: Option<Value>,
    pub token: Option<&'a str>,
    /// Raw path segments (ids, hashes) appended after the request path.
    pub segments: Vec<&'a str>,
    pub query: Vec<(&'a str, Option<String>)>,
}

impl<'a> RequestOptions<'a> {
    pub fn get(token: Option<&'a str>) -> Self {
        Self {
            method: Some(Method::GET),
            token,
            ..Default::default()
        }
    }

    pub fn with_body(method: Method, token: Option<&'a str>, body: Option<Value>) -> Self {
        Self {
            method: Some(method),
            body,
            token,
            ..Default::default()
        }
    }

    pub fn at(mut self, segments: &[&'a str]) -> Self {
        self.segments.extend_from_slice(segments);
        self
    }

    pub fn query(mut self, params: &[(&'a str, Option<String>)]) -> Self {
        self.query.extend_from_slice(params);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one backend request and return the parsed body.
    ///
    /// `path` must include the leading slash, e.g. `/api/admin/orders`.
    pub async fn request(&self, path: &str, opts: RequestOptions<'_>) -> Result<Value, ApiError> {
        if !path.starts_with('/') {
            return Err(ApiError::InvalidPath(path.to_string()));
        }
        let url = build_url(&self.base_url, path, &opts.segments, &opts.query)?;
        let method = opts.method.unwrap_or(Method::GET);

        let mut req = self.http.request(method.clone(), url);
        if let Some(token) = opts.token.filter(|t| !t.is_empty()) {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = opts.body {
            req = req.json(&body);
        }

        let started = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(friendly_error(&self.base_url, &e)))?;

        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend request finished"
        );

        let data = if text.is_empty() {
            Value::Null
        } else if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) if status.is_success() => return Err(ApiError::Decode(e.to_string())),
                Err(_) => Value::String(text),
            }
        } else {
            Value::String(text)
        };

        if !status.is_success() {
            let message = status_message(status, &data);
            warn!(path, status = status.as_u16(), error = %message, "backend request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
                data,
            });
        }

        Ok(data)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn normalize_base_url_strips_api_suffix_and_adds_scheme() {
        assert_eq!(normalize_base_url("localhost:5000/api/"), "http://localhost:5000");
        assert_eq!(normalize_base_url("cashback.app"), "https://cashback.app");
        assert_eq!(normalize_base_url("https://x.dev///"), "https://x.dev");
        assert_eq!(normalize_base_url("  "), "");
    }

    #[test]
    fn build_url_drops_empty_query_values() {
        let url = build_url("http://h:1", "/api/admin/qrs", &[], &[]).unwrap();
        assert_eq!(url.as_str(), "http://h:1/api/admin/qrs");

        let url = build_url(
            "http://h:1",
            "/api/admin/qrs",
            &[],
            &[("status", None), ("q", Some(String::new()))],
        )
        .unwrap();
        assert_eq!(url.query(), None);

        let url = build_url(
            "http://h:1",
            "/api/admin/qrs/batch",
            &[],
            &[
                ("orderId", Some("o 1&x".into())),
                ("limit", Some("5000".into())),
                ("skip", None),
            ],
        )
        .unwrap();
        assert_eq!(url.query(), Some("orderId=o+1%26x&limit=5000"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("orderId".into(), "o 1&x".into()));
    }

    #[test]
    fn build_url_encodes_path_segments() {
        let url = build_url("http://h:1", "/api/user/scan-qr", &["a/b c?#"], &[]).unwrap();
        assert_eq!(url.path(), "/api/user/scan-qr/a%2Fb%20c%3F%23");

        let url = build_url("http://h:1", "/api/admin/orders", &["o-9", "status"], &[]).unwrap();
        assert_eq!(url.path(), "/api/admin/orders/o-9/status");
    }

    #[tokio::test]
    async fn rejects_paths_without_leading_slash() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .request("api/admin", RequestOptions::default())
            .await
            .expect_err("relative path should fail");
        assert!(matches!(err, ApiError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn sends_bearer_token_and_json_body() {
        let app = Router::new().route(
            "/api/echo",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "auth": auth, "body": body }))
            }),
        );
        let base = test_server::spawn(app).await;
        let client = ApiClient::new(&base).unwrap();

        let data = client
            .request(
                "/api/echo",
                RequestOptions::with_body(Method::POST, Some("tok-1"), Some(json!({ "a": 1 }))),
            )
            .await
            .expect("echo should succeed");
        assert_eq!(data["auth"], "Bearer tok-1");
        assert_eq!(data["body"]["a"], 1);
    }

    #[tokio::test]
    async fn non_json_bodies_come_back_as_text() {
        let app = Router::new().route("/api/plain", get(|| async { "pong" }));
        let base = test_server::spawn(app).await;
        let client = ApiClient::new(&base).unwrap();

        let data = client
            .request("/api/plain", RequestOptions::get(None))
            .await
            .unwrap();
        assert_eq!(data, Value::String("pong".into()));
    }

    #[tokio::test]
    async fn error_status_carries_code_message_and_body() {
        let app = Router::new()
            .route(
                "/api/secure",
                get(|| async {
                    (
                        AxumStatus::UNAUTHORIZED,
                        Json(json!({ "message": "Token expired" })),
                    )
                }),
            )
            .route(
                "/api/broken",
                get(|| async { (AxumStatus::BAD_GATEWAY, Json(json!({}))) }),
            );
        let base = test_server::spawn(app).await;
        let client = ApiClient::new(&base).unwrap();

        let err = client
            .request("/api/secure", RequestOptions::get(Some("stale")))
            .await
            .expect_err("401 should fail");
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Token expired");
        assert_eq!(err.data()["message"], "Token expired");

        let err = client
            .request("/api/broken", RequestOptions::get(None))
            .await
            .expect_err("502 should fail");
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_unauthorized());
        assert_eq!(err.to_string(), "Request failed (502)");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        let err = client
            .request("/api/anything", RequestOptions::get(None))
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
