//! Redaction of captured request/response data before it is logged.
//!
//! Fields are targeted by name only; values are never inspected to decide
//! what to redact, and untargeted fields are returned unchanged.

use serde_json::Value;
use std::collections::BTreeMap;

/// Replacement for redacted cookie and body values.
pub const REDACTED: &str = "REDACTED";

/// Replacement for the credentials part of an `authorization` header.
pub const REDACTED_CREDENTIALS: &str = "[REDACTED]";

/// Replacement for headers excluded from logs altogether.
pub const EXCLUDED: &str = "EXCLUDED";

/// Header names mapped to values, as captured from a request or response.
pub type HeaderSnapshot = BTreeMap<String, String>;

/// What to redact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Cookies whose values are replaced with [`REDACTED`].
    pub sensitive_cookies: Vec<String>,
    /// Headers whose whole value is replaced with [`EXCLUDED`].
    /// `if-none-match` is listed by default since its quoted value can
    /// corrupt structured output.
    pub excluded_headers: Vec<String>,
    /// Top-level response body keys whose values are replaced with
    /// [`REDACTED`].
    pub body_deny_list: Vec<String>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            sensitive_cookies: vec!["AccessToken".to_string(), "RefreshToken".to_string()],
            excluded_headers: vec!["if-none-match".to_string()],
            body_deny_list: Vec::new(),
        }
    }
}

/// Redact `authorization`, sensitive cookies and excluded headers.
pub fn sanitize_headers(headers: &HeaderSnapshot, options: &SanitizeOptions) -> HeaderSnapshot {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case("authorization") {
                redact_authorization(value)
            } else if name.eq_ignore_ascii_case("cookie") {
                redact_cookies(value, &options.sensitive_cookies)
            } else if options
                .excluded_headers
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(name))
            {
                EXCLUDED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// `Bearer abc` becomes `Bearer [REDACTED]`; a value without a scheme
/// becomes `[REDACTED]`.
pub fn redact_authorization(value: &str) -> String {
    match value.trim().split_once(' ') {
        Some((scheme, _)) => format!("{} {}", scheme, REDACTED_CREDENTIALS),
        None => REDACTED_CREDENTIALS.to_string(),
    }
}

/// Replace the values of the named cookies in a `cookie` header.
pub fn redact_cookies(header: &str, sensitive: &[String]) -> String {
    header
        .split("; ")
        .map(|cookie| {
            let name = cookie.split_once('=').map_or(cookie, |(name, _)| name);
            if sensitive.iter().any(|s| s == name) {
                format!("{}={}", name, REDACTED)
            } else {
                cookie.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Redact deny-listed top-level keys of a JSON object body. Absent and
/// non-object bodies are returned as they are.
pub fn sanitize_body(body: Option<&Value>, deny_list: &[String]) -> Option<Value> {
    let mut body = body?.clone();
    if let Value::Object(map) = &mut body {
        for key in deny_list {
            if let Some(value) = map.get_mut(key) {
                *value = Value::String(REDACTED.to_string());
            }
        }
    }
    Some(body)
}
