//! Axum middleware.
//!
//! [`attach_request_context`] opens a request context around the rest of
//! the stack; [`access_log`] writes one record per request through the
//! façade. Install the context layer outermost so the access record is
//! attributed to its request:
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(from_fn_with_state(access, access_log))
//!     .layer(from_fn_with_state(logger.clone(), attach_request_context));
//! ```

use crate::context;
use crate::facade::ContextLogger;
use crate::level::Level;
use crate::record::Meta;
use crate::sanitizer::{sanitize_body, sanitize_headers, HeaderSnapshot, SanitizeOptions};
use axum::body::{to_bytes, Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Response header carrying the generated request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Run the rest of the stack inside a fresh request context and echo the
/// request id in the response.
pub async fn attach_request_context(
    State(logger): State<ContextLogger>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = logger.new_request_context();
    let request_id = ctx.request_id().to_string();
    let mut response = context::scope(ctx, next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

#[derive(Debug, Clone)]
pub struct AccessLogOptions {
    pub sanitize: SanitizeOptions,
    /// Capture JSON response bodies whose known length is at most
    /// `max_body_bytes`.
    pub capture_response_body: bool,
    pub max_body_bytes: usize,
}

impl Default for AccessLogOptions {
    fn default() -> Self {
        Self {
            sanitize: SanitizeOptions::default(),
            capture_response_body: false,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// State for [`access_log`].
#[derive(Debug, Clone)]
pub struct AccessLog {
    logger: ContextLogger,
    options: Arc<AccessLogOptions>,
}

impl AccessLog {
    pub fn new(logger: ContextLogger, options: AccessLogOptions) -> Self {
        Self {
            logger,
            options: Arc::new(options),
        }
    }
}

/// Log `"{METHOD} {URI}"` with sanitized request/response details under
/// the `http` field. 5xx responses log at `error`, 4xx at `warn`, the
/// rest at `info`.
pub async fn access_log(State(access): State<AccessLog>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let url = request.uri().to_string();
    let request_headers = sanitize_headers(&snapshot(request.headers()), &access.options.sanitize);

    let response = next.run(request).await;
    let status = response.status();
    let response_headers = snapshot(response.headers());
    let (response, body) = capture_body(response, &access.options).await;

    let mut res = json!({
        "statusCode": status.as_u16(),
        "headers": response_headers,
    });
    if let Some(body) = sanitize_body(body.as_ref(), &access.options.sanitize.body_deny_list) {
        res["body"] = body;
    }
    let http = json!({
        "req": {
            "method": method,
            "url": url,
            "headers": request_headers,
        },
        "res": res,
        "responseTime": started.elapsed().as_millis() as u64,
    });

    access
        .logger
        .log_with(level_for(status), format!("{} {}", method, url), Meta::new().field("http", &http));
    response
}

fn level_for(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::Error
    } else if status.is_client_error() {
        Level::Warn
    } else {
        Level::Info
    }
}

/// Header names are lowercase already; repeated headers are joined.
fn snapshot(headers: &HeaderMap) -> HeaderSnapshot {
    let mut out = HeaderSnapshot::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

async fn capture_body(response: Response, options: &AccessLogOptions) -> (Response, Option<Value>) {
    if !options.capture_response_body || !is_json(response.headers()) {
        return (response, None);
    }
    let (parts, body) = response.into_parts();
    let length = declared_length(&parts.headers).or_else(|| body.size_hint().exact());
    if !matches!(length, Some(len) if len <= options.max_body_bytes as u64) {
        return (Response::from_parts(parts, body), None);
    }
    match to_bytes(body, options.max_body_bytes).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).ok();
            (Response::from_parts(parts, Body::from(bytes)), value)
        }
        Err(e) => {
            tracing::debug!(error = %e, "could not read response body for access log");
            (Response::from_parts(parts, Body::empty()), None)
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_levels() {
        assert_eq!(level_for(StatusCode::OK), Level::Info);
        assert_eq!(level_for(StatusCode::NOT_FOUND), Level::Warn);
        assert_eq!(level_for(StatusCode::BAD_GATEWAY), Level::Error);
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        assert_eq!(snapshot(&headers)["accept"], "text/html, application/json");
    }

    #[test]
    fn json_detection_and_declared_length() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));
        assert_eq!(declared_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("8"));
        assert_eq!(declared_length(&headers), Some(8));
    }

    #[tokio::test]
    async fn oversized_bodies_are_not_captured() {
        let options = AccessLogOptions {
            capture_response_body: true,
            max_body_bytes: 4,
            ..AccessLogOptions::default()
        };
        let response = Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();
        let (response, captured) = capture_body(response, &options).await;
        assert!(captured.is_none());
        let bytes = to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&bytes[..], br#"{"a":1}"#);
    }
}
