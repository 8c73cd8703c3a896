use serde_json::Value;

use super::transport::TransportError;

/// Classified outcome of a failed request, as seen by callers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Connectivity, DNS or TLS failure before any response arrived.
    #[error("network error: {0}")]
    Network(String),
    /// No response within the pipeline's own timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Cancelled through a caller-supplied token (or by the host).
    #[error("request aborted")]
    Aborted,
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    /// Success status, but the body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The request body could not be serialized; nothing was sent.
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    /// Transient failures worth resubmitting: network, own timeout, and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout { .. } => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Aborted | ApiError::Decode(_) | ApiError::Encode(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Server-provided detail for HTTP failures, otherwise the display text.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Connect(msg) => ApiError::Network(msg),
            TransportError::Aborted => ApiError::Aborted,
        }
    }
}

/// Pulls a human-readable message out of an error body.
///
/// Order: `detail` string, `detail` array (joined with `"; "`), `message`,
/// then the status line.
pub fn extract_detail(status: u16, status_text: &str, body: &[u8]) -> String {
    let status_line = || format!("{status} {status_text}").trim_end().to_string();

    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return status_line();
    };

    match json.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => return s.clone(),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .map(sub_error_message)
                .filter(|s| !s.is_empty())
                .collect();
            if !parts.is_empty() {
                return parts.join("; ");
            }
        }
        _ => {}
    }

    match json.get("message") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => status_line(),
    }
}

/// One entry of a validation-error list (`{"loc": [...], "msg": "..."}` or a bare string).
fn sub_error_message(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("msg")
            .or_else(|| obj.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
