//! Clients for the chat backend's remote collaborators.

pub mod catalog;
pub mod chat;
pub mod upload;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of API errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// HTTP 429 from the backend.
    RateLimited,
    /// Any other HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse a response (JSON parse error, invalid SSE, etc.)
    Parse,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::RateLimited => write!(f, "rate_limited"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error from a backend call with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error from a failed HTTP response.
    ///
    /// Status 429 maps to `RateLimited`. For other statuses the body is
    /// probed for the backend's `{"msg": "..."}` shape; when present that
    /// message is surfaced, otherwise a generic `HTTP <status>` summary.
    pub fn http_status(status: u16, body: &str) -> Self {
        if status == 429 {
            return Self {
                kind: ApiErrorKind::RateLimited,
                message: "Rate limited, slow down".to_string(),
                details: (!body.is_empty()).then(|| body.to_string()),
            };
        }

        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                json.get("msg")
                    .and_then(|v| v.as_str())
                    .map(|msg| format!("HTTP {status}: {msg}"))
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            kind: ApiErrorKind::HttpStatus,
            message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    /// Returns true if this error is the backend's rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ApiErrorKind::RateLimited
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Classifies a reqwest transport error into an `ApiError`.
pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::timeout(format!("Connection failed: {e}"))
    } else {
        ApiError::new(ApiErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}
