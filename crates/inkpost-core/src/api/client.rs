//! Low-level HTTP client for the blog API.
//!
//! `ApiClient` knows the base URL and endpoint layout but nothing about the
//! session. Requests that need the credential go through `Gateway`, which
//! applies the authorization policy and the unauthorized interceptor.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use tracing::debug;

use crate::config::Config;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when the config does not set one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Token endpoint, relative to the API base URL
const TOKEN_PATH: &str = "/token";

/// API client for the blog server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (for example `http://localhost:8000/api`)
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Start a request with no credential attached
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json")
    }

    /// Exchange a username and password for a bearer token.
    ///
    /// The raw response is returned so the caller can tell a credential
    /// rejection apart from other failures.
    pub async fn request_token(&self, username: &str, password: &str) -> Result<Response, ApiError> {
        debug!(username, "Requesting access token");
        let response = self
            .request(Method::POST, TOKEN_PATH)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        debug!(status = %response.status(), "Token endpoint responded");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let api = ApiClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000/api");
        assert_eq!(api.url("/posts/"), "http://localhost:8000/api/posts/");
        assert_eq!(api.url("users/me/"), "http://localhost:8000/api/users/me/");
    }

    #[test]
    fn test_request_has_no_authorization() {
        let api = ApiClient::new("http://localhost:8000/api").unwrap();
        let request = api.request(Method::GET, "/posts/").build().unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert_eq!(
            request.headers().get(header::ACCEPT).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }
}
