use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The token endpoint rejected the username/password pair. Carries the
    /// server's detail, or "Invalid username or password" when it sent none.
    #[error("{0}")]
    Authentication(String),

    /// A protected call came back 401/403. The session has already been
    /// cleared and the user redirected to the login view.
    #[error("Session expired - please sign in again")]
    SessionExpired,

    #[error("{message}")]
    Request { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The server answered with a success status but the body was unusable.
    #[error("Invalid response: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The view that issued the request went away before the response arrived.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    InvalidInput(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape used by the server: `{"detail": "..."}`, occasionally
/// `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the server-provided message out of a JSON error body.
    ///
    /// `detail` is usually a string but validation errors send a list of
    /// objects; those are rendered as compact JSON rather than dropped.
    pub fn server_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let detail = match parsed.detail {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        detail
            .or(parsed.message)
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::truncate_body(&s))
    }

    /// Build the error for a non-success status that was not intercepted.
    ///
    /// `fallback` is used when the body carries no usable message.
    pub fn from_status(status: reqwest::StatusCode, body: &str, fallback: &str) -> Self {
        let message = Self::server_detail(body).unwrap_or_else(|| fallback.to_string());
        match status.as_u16() {
            404 => ApiError::NotFound(message),
            code => ApiError::Request {
                status: code,
                message,
            },
        }
    }

    /// True when the failure was already communicated through navigation
    /// (redirect to the login view), so views must not show a banner for it.
    pub fn is_intercepted(&self) -> bool {
        matches!(self, ApiError::Authentication(_) | ApiError::SessionExpired)
    }

    /// Text for an inline error banner, or `None` when the view should stay
    /// silent (intercepted or cancelled requests).
    pub fn user_message(&self) -> Option<String> {
        match self {
            ApiError::Authentication(_) | ApiError::SessionExpired | ApiError::Cancelled => None,
            ApiError::Network(e) if e.is_timeout() => {
                Some("Connection timed out. Please try again.".to_string())
            }
            ApiError::Network(e) if e.is_connect() => {
                Some("Unable to connect to server. Check your internet connection.".to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_server_detail_prefers_detail() {
        let body = r#"{"detail": "Incorrect username or password", "message": "other"}"#;
        assert_eq!(
            ApiError::server_detail(body).as_deref(),
            Some("Incorrect username or password")
        );
    }

    #[test]
    fn test_server_detail_falls_back_to_message() {
        let body = r#"{"message": "Title already taken"}"#;
        assert_eq!(ApiError::server_detail(body).as_deref(), Some("Title already taken"));
    }

    #[test]
    fn test_server_detail_structured() {
        let body = r#"{"detail": [{"loc": ["body", "title"], "msg": "field required"}]}"#;
        let detail = ApiError::server_detail(body).unwrap();
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_server_detail_non_json() {
        assert!(ApiError::server_detail("<html>Bad Gateway</html>").is_none());
        assert!(ApiError::server_detail("").is_none());
        assert!(ApiError::server_detail(r#"{"detail": "  "}"#).is_none());
    }

    #[test]
    fn test_from_status_uses_fallback() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "oops", "Failed: 500");
        match err {
            ApiError::Request { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed: 500");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_not_found() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail":"Post not found"}"#, "x");
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Post not found"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_intercepted_errors_are_silent() {
        assert!(ApiError::SessionExpired.is_intercepted());
        assert!(ApiError::Authentication("bad".into()).is_intercepted());
        assert_eq!(
            ApiError::Authentication("Inactive user".into()).to_string(),
            "Inactive user"
        );
        assert!(ApiError::SessionExpired.user_message().is_none());
        assert!(ApiError::Cancelled.user_message().is_none());
        assert!(!ApiError::Cancelled.is_intercepted());

        let err = ApiError::Request {
            status: 400,
            message: "Title required".into(),
        };
        assert!(!err.is_intercepted());
        assert_eq!(err.user_message().as_deref(), Some("Title required"));
    }
}
