//! Turns a terminal error response into an [`ApiError`].

use serde_json::Value;

use super::transport::RawResponse;
use crate::error::{ApiError, ApiErrorKind};

const FALLBACK_MESSAGE: &str = "Unknown error";

/// Classifies a failed response. Pure and total: any status maps to some kind.
pub fn classify(response: &RawResponse) -> ApiError {
    let kind = ApiErrorKind::from_status(response.status);
    let body = parse_body(&response.body);
    let message = extract_message(body.as_ref(), &response.body);

    let retry_after = match kind {
        ApiErrorKind::RateLimit => response.retry_after(),
        _ => None,
    };

    ApiError {
        kind,
        status: response.status,
        message,
        body,
        request_id: response.request_id().map(str::to_string),
        retry_after,
    }
}

/// Parses the body as JSON; anything malformed or empty is simply absent.
fn parse_body(raw: &[u8]) -> Option<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(raw).ok()
}

/// Picks `detail`, then `message`, then the raw text, then a fixed fallback.
fn extract_message(body: Option<&Value>, raw: &[u8]) -> String {
    let field = |name: &str| {
        body.and_then(|b| b.get(name))
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    };

    field("detail")
        .or_else(|| field("message"))
        .or_else(|| {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
