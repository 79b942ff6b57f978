//! API error types

use thiserror::Error;

/// Last-resort text when a failure carries nothing readable
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

/// Failure of a single request, with whatever the server told us
#[derive(Debug, Clone, Error)]
#[error("{}", self.user_message())]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status code, when a response arrived
    pub status: Option<u16>,
    /// Reason phrase of the status line (e.g. "Unauthorized")
    pub status_text: Option<String>,
    /// Server-supplied detail message
    pub detail: Option<String>,
    /// Transport-level description (connection refused, timeout, decode failure)
    pub message: Option<String>,
}

/// Error classification for mapping into session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No response: connection failure, timeout
    Network,
    /// Server answered with a non-success status
    Status,
    /// Server answered 2xx but the body was not what we expected
    Decode,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            status_text: None,
            detail: None,
            message: Some(message.into()),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            status: None,
            status_text: None,
            detail: None,
            message: Some(message.into()),
        }
    }

    pub fn status(code: u16, status_text: Option<&str>, detail: Option<String>) -> Self {
        Self {
            kind: ApiErrorKind::Status,
            status: Some(code),
            status_text: status_text.map(str::to_string),
            detail,
            message: None,
        }
    }

    /// Build from a non-success response body. Understands `{"detail": "..."}`
    /// and validation arrays of the form `{"detail": [{"msg": "..."}, ...]}`.
    pub fn from_response(code: u16, status_text: Option<&str>, body: &str) -> Self {
        Self::status(code, status_text, extract_detail(body))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// Text shown to the user: detail, then status text, then transport
    /// message, then a fixed fallback.
    pub fn user_message(&self) -> String {
        [&self.detail, &self.status_text, &self.message]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(FALLBACK_ERROR_MESSAGE)
            .to_string()
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    match parsed.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
