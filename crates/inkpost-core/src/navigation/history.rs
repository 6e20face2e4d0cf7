use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Path the guard denied, remembered across the login detour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct NavigationIntent {
    pub target_path: String,
}

impl NavigationIntent {
    pub fn new(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
        }
    }
}

/// Ephemeral state attached to a single history entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationState {
    /// Set by the route guard when it redirects to login
    pub from: Option<NavigationIntent>,
    /// Set by `handle_unauthorized` to tell the login view why it is shown
    pub session_expired: bool,
    /// Set after a successful account validation
    pub validation_success: bool,
}

impl LocationState {
    pub fn from_intent(intent: NavigationIntent) -> Self {
        Self {
            from: Some(intent),
            ..Self::default()
        }
    }

    pub fn session_expired() -> Self {
        Self {
            session_expired: true,
            ..Self::default()
        }
    }

    pub fn validation_success() -> Self {
        Self {
            validation_success: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Overwrite the current entry instead of pushing a new one
    pub replace: bool,
    pub state: Option<LocationState>,
}

impl NavigateOptions {
    pub fn push() -> Self {
        Self::default()
    }

    pub fn replace() -> Self {
        Self {
            replace: true,
            state: None,
        }
    }

    pub fn with_state(mut self, state: LocationState) -> Self {
        self.state = Some(state);
        self
    }
}

/// One history entry: a path, its query string and attached state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub state: Option<LocationState>,
}

impl Location {
    /// Split `target` into path and query (`/login?signup=success`).
    pub fn parse(target: &str, state: Option<LocationState>) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self {
                path: normalize_path(path),
                query: Some(query.to_string()).filter(|q| !q.is_empty()),
                state,
            },
            None => Self {
                path: normalize_path(target),
                query: None,
                state,
            },
        }
    }

    /// Look up a query parameter value
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// Path plus query, as it would appear in an address bar
    pub fn href(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Sink for navigation side effects.
///
/// Auth operations and the route guard only ever talk to this trait, so a
/// terminal front end, a webview bridge and tests can each supply their own.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str, options: NavigateOptions);

    fn current(&self) -> Location;

    /// Read and remove the state attached to the current entry.
    ///
    /// The login view calls this exactly once on arrival so a remembered
    /// destination cannot resurface on a later, unrelated visit.
    fn take_state(&self) -> Option<LocationState>;
}

struct HistoryInner {
    entries: Vec<Location>,
    index: usize,
    navigations: usize,
}

/// In-memory history stack with browser-like push/replace semantics.
pub struct History {
    inner: Mutex<HistoryInner>,
}

impl History {
    pub fn new(start: &str) -> Self {
        Self {
            inner: Mutex::new(HistoryInner {
                entries: vec![Location::parse(start, None)],
                index: 0,
                navigations: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of entries a user could step back through
    pub fn len(&self) -> usize {
        self.lock().index + 1
    }

    /// Total `navigate` calls so far, pushes and replaces alike
    pub fn navigation_count(&self) -> usize {
        self.lock().navigations
    }

    /// Step back one entry. Returns the new location, or `None` at the start.
    pub fn back(&self) -> Option<Location> {
        let mut inner = self.lock();
        if inner.index == 0 {
            return None;
        }
        inner.index -= 1;
        Some(inner.entries[inner.index].clone())
    }
}

impl Navigator for History {
    fn navigate(&self, to: &str, options: NavigateOptions) {
        let location = Location::parse(to, options.state);
        let mut inner = self.lock();
        inner.navigations += 1;
        if options.replace {
            let index = inner.index;
            inner.entries[index] = location;
        } else {
            let next = inner.index + 1;
            inner.entries.truncate(next);
            inner.entries.push(location);
            inner.index = next;
        }
        debug!(to, replace = options.replace, "Navigated");
    }

    fn current(&self) -> Location {
        let inner = self.lock();
        inner.entries[inner.index].clone()
    }

    fn take_state(&self) -> Option<LocationState> {
        let mut inner = self.lock();
        let index = inner.index;
        inner.entries[index].state.take()
    }
}
