//! Route guard for protected views.
//!
//! The guard is a pure allow/deny decision over the session snapshot taken
//! at evaluation time. `enforce` adds the redirect; the `Router` calls it on
//! every visit so a session that ended mid-flight is noticed on the next
//! navigation rather than only when a view first mounts.

use tracing::info;

use crate::auth::Session;

use super::history::{Location, LocationState, NavigateOptions, NavigationIntent, Navigator};
use super::{DEFAULT_PROTECTED_PATHS, LOGIN_PATH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    /// Visitor was sent to login; `intent` holds where they were going
    Denied { intent: NavigationIntent },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allowed)
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<String>,
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_PATHS.iter().copied())
    }
}

impl RouteGuard {
    pub fn new<I, S>(protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: protected
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .collect(),
            login_path: LOGIN_PATH.to_string(),
        }
    }

    /// True when `path` is one of the protected prefixes or below one.
    /// Prefixes match whole segments: `/profile` covers `/profile/edit`
    /// but not `/profiles`.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.protected.iter().any(|prefix| {
            if prefix.is_empty() {
                return true;
            }
            match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }

    /// Decide without side effects.
    pub fn evaluate(&self, location: &Location, session: &Session) -> GuardDecision {
        if !self.is_protected(&location.path) || session.is_authenticated() {
            return GuardDecision::Allowed;
        }
        GuardDecision::Denied {
            intent: NavigationIntent::new(location.href()),
        }
    }

    /// Decide, and on denial redirect to login carrying the intent.
    ///
    /// The redirect replaces the denied entry, so repeated denials do not
    /// stack up in back-navigation.
    pub fn enforce(
        &self,
        location: &Location,
        session: &Session,
        navigator: &dyn Navigator,
    ) -> GuardDecision {
        let decision = self.evaluate(location, session);
        if let GuardDecision::Denied { ref intent } = decision {
            info!(path = %intent.target_path, "Not authenticated, redirecting to login");
            navigator.navigate(
                &self.login_path,
                NavigateOptions::replace().with_state(LocationState::from_intent(intent.clone())),
            );
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, UserIdentity};
    use crate::navigation::History;

    fn location(path: &str) -> Location {
        Location::parse(path, None)
    }

    #[test]
    fn test_is_protected() {
        let guard = RouteGuard::default();
        assert!(guard.is_protected("/profile"));
        assert!(guard.is_protected("/profile/edit"));
        assert!(guard.is_protected("/posts/new"));
        assert!(guard.is_protected("/posts/new?draft=1"));
        assert!(!guard.is_protected("/profiles"));
        assert!(!guard.is_protected("/posts/42"));
        assert!(!guard.is_protected("/"));
    }

    #[test]
    fn test_trailing_slash_prefix() {
        let guard = RouteGuard::new(["/admin/"]);
        assert!(guard.is_protected("/admin"));
        assert!(guard.is_protected("/admin/users"));
    }

    #[test]
    fn test_allowed_when_authenticated() {
        let guard = RouteGuard::default();
        let session = Session::authenticated(Credential::new("abc"), UserIdentity::restored());
        assert!(guard.evaluate(&location("/profile"), &session).is_allowed());
    }

    #[test]
    fn test_public_paths_always_allowed() {
        let guard = RouteGuard::default();
        assert!(guard.evaluate(&location("/posts/42"), &Session::anonymous()).is_allowed());
    }

    #[test]
    fn test_denied_redirects_with_intent() {
        let guard = RouteGuard::default();
        let history = History::new("/");
        history.navigate("/profile", NavigateOptions::push());

        let decision = guard.enforce(&location("/profile"), &Session::anonymous(), &history);
        assert_eq!(
            decision,
            GuardDecision::Denied {
                intent: NavigationIntent::new("/profile")
            }
        );

        let current = history.current();
        assert_eq!(current.path, LOGIN_PATH);
        assert_eq!(
            current.state.and_then(|s| s.from),
            Some(NavigationIntent::new("/profile"))
        );
        // Denied entry was replaced
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_intent_keeps_query() {
        let guard = RouteGuard::default();
        let decision = guard.evaluate(&location("/posts/new?draft=1"), &Session::anonymous());
        assert_eq!(
            decision,
            GuardDecision::Denied {
                intent: NavigationIntent::new("/posts/new?draft=1")
            }
        );
    }
}
