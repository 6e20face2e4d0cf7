//! Unauthorized-response interceptor.
//!
//! Every response to a credentialed request passes through [`intercept`]
//! before anything looks at its body. A 401/403 ends the session and the
//! caller only ever sees [`ApiError::SessionExpired`].

use reqwest::{Response, StatusCode};
use tracing::warn;

use crate::auth::{AuthService, Credential};

use super::ApiError;

/// Statuses that mean "this credential is no good"
pub fn is_rejection(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Classify a response.
///
/// `sent_with` is the credential the request actually carried, so a late
/// rejection of an old token cannot end a session established afterwards.
/// `fallback` is the inline message used when a failure body has no detail.
pub async fn intercept(
    response: Response,
    sent_with: Option<&Credential>,
    auth: &AuthService,
    fallback: &str,
) -> Result<Response, ApiError> {
    let status = response.status();

    // Must precede the generic success check: rejections are not ordinary failures
    if is_rejection(status) {
        warn!(status = %status, url = %response.url().path(), "Request rejected, ending session");
        auth.reject_credential(sent_with);
        return Err(ApiError::SessionExpired);
    }

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(
        status,
        &body,
        &format!("{}: {}", fallback, status.as_u16()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_statuses() {
        assert!(is_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_rejection(StatusCode::FORBIDDEN));
        assert!(!is_rejection(StatusCode::NOT_FOUND));
        assert!(!is_rejection(StatusCode::OK));
        assert!(!is_rejection(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
