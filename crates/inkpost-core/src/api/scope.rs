use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ApiError;

/// Lifetime of one mounted view's requests.
///
/// Dropping the scope (the view unmounted, or the user navigated away)
/// cancels it. Requests issued under a cancelled scope resolve to
/// [`ApiError::Cancelled`] and their responses are never applied.
#[derive(Debug)]
pub struct ViewScope {
    label: String,
    token: CancellationToken,
}

impl ViewScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: CancellationToken::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Handle that observes (and can trigger) this scope's cancellation
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` unless the scope is cancelled first.
    ///
    /// A result that arrives after cancellation is discarded as well.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if self.token.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ApiError::Cancelled),
            result = fut => result,
        };
        if self.token.is_cancelled() {
            debug!(scope = %self.label, "Discarding response for cancelled view");
            return Err(ApiError::Cancelled);
        }
        result
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
