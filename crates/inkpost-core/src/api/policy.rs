//! Request authorization policy.
//!
//! The header is computed from the session snapshot taken when a request is
//! issued. Nothing is cached, so a credential cleared between render and
//! fetch is never sent.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use tracing::warn;

use crate::auth::{Credential, Session};

/// `Bearer <token>` for the given credential.
///
/// Returns `None` when the token contains bytes that cannot appear in a
/// header; such a token could never authenticate anyway.
pub fn bearer_value(credential: &Credential) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.as_str())).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// The `Authorization` header value for this session, if any
pub fn authorization_header(session: &Session) -> Option<HeaderValue> {
    let credential = session.credential()?;
    let value = bearer_value(credential);
    if value.is_none() {
        warn!("Stored credential is not a valid header value; sending request without it");
    }
    value
}

/// Attach the session's credential to `builder`, or leave it untouched when
/// the session is anonymous.
pub fn authorize(builder: RequestBuilder, session: &Session) -> RequestBuilder {
    match authorization_header(session) {
        Some(value) => builder.header(AUTHORIZATION, value),
        None => builder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserIdentity;

    fn build(session: &Session) -> reqwest::Request {
        let builder = reqwest::Client::new().get("http://localhost/api/users/me/");
        authorize(builder, session).build().unwrap()
    }

    #[test]
    fn test_bearer_header_attached() {
        let session = Session::authenticated(Credential::new("abc"), UserIdentity::restored());
        let request = build(&session);
        assert_eq!(
            request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
    }

    #[test]
    fn test_no_header_when_anonymous() {
        let request = build(&Session::anonymous());
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_header_is_sensitive() {
        let value = bearer_value(&Credential::new("abc")).unwrap();
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_invalid_token_is_skipped() {
        let session = Session::authenticated(Credential::new("bad\ntoken"), UserIdentity::restored());
        assert!(authorization_header(&session).is_none());
        let request = build(&session);
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
