use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ViewScope;
use crate::auth::AuthService;

use super::guard::{GuardDecision, RouteGuard};
use super::history::{Location, NavigateOptions};

/// Outcome of a visit
#[derive(Debug)]
pub enum Visit {
    /// Render the view at `location`. Requests for it must run under
    /// `scope`; dropping the scope unmounts the view.
    Render { location: Location, scope: ViewScope },
    /// The guard sent the visitor to `to` instead
    Redirected { to: Location },
}

/// Couples navigation with the route guard.
///
/// Each visit cancels the previous view's scope before anything else, so a
/// response still in flight for the old view is discarded, then evaluates
/// the guard against the session as it is at that moment.
pub struct Router {
    auth: Arc<AuthService>,
    guard: RouteGuard,
    active: Mutex<Option<CancellationToken>>,
}

impl Router {
    pub fn new(auth: Arc<AuthService>, guard: RouteGuard) -> Self {
        Self {
            auth,
            guard,
            active: Mutex::new(None),
        }
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Navigate to `target` (pushing a history entry) and run the guard.
    pub fn visit(&self, target: &str) -> Visit {
        self.unmount_active();

        let navigator = self.auth.navigator();
        navigator.navigate(target, NavigateOptions::push());
        let location = navigator.current();

        match self
            .guard
            .enforce(&location, &self.auth.session(), navigator.as_ref())
        {
            GuardDecision::Allowed => {
                let scope = ViewScope::new(location.path.clone());
                *self.lock_active() = Some(scope.token());
                debug!(path = %location.path, "Rendering view");
                Visit::Render { location, scope }
            }
            GuardDecision::Denied { .. } => Visit::Redirected {
                to: navigator.current(),
            },
        }
    }

    /// Re-run the guard for the current location without navigating.
    ///
    /// Useful when the session changes while a protected view is showing.
    pub fn revalidate(&self) -> GuardDecision {
        let navigator = self.auth.navigator();
        let location = navigator.current();
        let decision = self
            .guard
            .enforce(&location, &self.auth.session(), navigator.as_ref());
        if !decision.is_allowed() {
            self.unmount_active();
        }
        decision
    }

    fn unmount_active(&self) {
        if let Some(token) = self.lock_active().take() {
            token.cancel();
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.unmount_active();
    }
}
