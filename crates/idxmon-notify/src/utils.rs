//! Shared helpers for HTTP-backed channels.

use crate::error::{NotifyError, Result};
use serde_json::Value;
use std::time::Duration;

/// Maximum number of response body characters kept in error messages.
pub const MAX_BODY_LENGTH: usize = 500;

/// Attempts per delivery before a channel gives up.
pub const SEND_ATTEMPTS: u32 = 3;

/// Truncates `s` to at most `max_len` bytes on a char boundary.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Sends the request produced by `build` up to [`SEND_ATTEMPTS`] times with
/// exponential backoff (100 ms, 200 ms), stopping at the first 2xx response.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed
/// by sending.
pub async fn send_with_retry<F>(service: &str, mut build: F) -> Result<()>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut last_err = None;
    for attempt in 0..SEND_ATTEMPTS {
        match build().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status();
                let body = match resp.text().await {
                    Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                    Err(e) => format!("[Failed to read response body: {e}]"),
                };
                tracing::warn!(
                    service,
                    attempt = attempt + 1,
                    status = %status,
                    "Channel endpoint returned non-success status, retrying"
                );
                last_err = Some(NotifyError::ApiError {
                    service: service.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                tracing::warn!(
                    service,
                    attempt = attempt + 1,
                    error = %e,
                    "Channel send failed, retrying"
                );
                last_err = Some(NotifyError::HttpError(e));
            }
        }
        if attempt + 1 < SEND_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
        }
    }

    let err = last_err.unwrap_or_else(|| NotifyError::Other(format!("{service}: no attempt made")));
    tracing::error!(service, error = %err, "Channel failed after {SEND_ATTEMPTS} attempts");
    Err(err)
}

/// Redacts values of keys that commonly hold secrets (password, token,
/// secret, api key, credentials), recursing into nested objects and arrays.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let is_sensitive = [
                    "password",
                    "passwd",
                    "token",
                    "secret",
                    "api_key",
                    "apikey",
                    "credentials",
                ]
                .iter()
                .any(|needle| key_lower.contains(needle));

                if is_sensitive {
                    redacted.insert(key.clone(), Value::String("***".to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_json(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_json).collect()),
        _ => value.clone(),
    }
}
