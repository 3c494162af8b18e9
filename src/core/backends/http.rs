use futures_util::TryStreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::BackendSpec;
use crate::core::chat_stream::{decode_stream, SnapshotCallback, StreamShape};
use crate::core::error::CompletionError;

pub(crate) const NO_RESPONSE: &str = "No response generated";

/// Send `request`; non-2xx responses become a provider or network error
/// built from the body.
///
/// Transport errors are reported without the request URL, which may carry
/// credentials in its query string.
pub(crate) async fn send_checked(
    request: RequestBuilder,
    spec: &BackendSpec,
    error_path: &str,
) -> Result<Response, CompletionError> {
    debug!(backend = spec.id, "sending completion request");
    let response = request.send().await.map_err(|err| {
        CompletionError::Network(spec.with_hint(format!(
            "{} API request failed: {}",
            spec.display_name,
            err.without_url()
        )))
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(api_error(spec, status, &body, error_path))
}

pub(crate) fn api_error(
    spec: &BackendSpec,
    status: StatusCode,
    body: &str,
    error_path: &str,
) -> CompletionError {
    let trimmed = body.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value, error_path) {
            return CompletionError::Provider {
                backend: spec.display_name.to_string(),
                message: spec.with_hint(summary),
            };
        }
    }

    let message = if trimmed.is_empty() {
        format!(
            "{} API request failed (status {})",
            spec.display_name,
            status.as_u16()
        )
    } else {
        format!(
            "{} API request failed (status {}): {trimmed}",
            spec.display_name,
            status.as_u16()
        )
    };
    CompletionError::Network(spec.with_hint(message))
}

/// Pull a human-readable message out of an error body, trying the
/// provider's own field first.
fn extract_error_summary(value: &Value, error_path: &str) -> Option<String> {
    let summary = value
        .pointer(error_path)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| value.get("message").and_then(|v| v.as_str().map(str::to_owned)));

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Read a non-streaming body and return the text at `text_path`.
pub(crate) async fn read_whole_text(
    response: Response,
    spec: &BackendSpec,
    text_path: &str,
) -> Result<String, CompletionError> {
    let value: Value = response.json().await.map_err(|err| {
        CompletionError::Network(format!(
            "Failed to parse {} response: {}",
            spec.display_name,
            err.without_url()
        ))
    })?;

    Ok(or_placeholder(
        value
            .pointer(text_path)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    ))
}

pub(crate) async fn read_streamed_text(
    response: Response,
    shape: StreamShape,
    on_chunk: &mut SnapshotCallback<'_>,
) -> Result<String, CompletionError> {
    let stream = response.bytes_stream().map_err(reqwest::Error::without_url);
    decode_stream(stream, shape, Some(on_chunk))
        .await
        .map(or_placeholder)
}

fn or_placeholder(text: String) -> String {
    if text.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        text
    }
}
