//! Navigation primitives shared by the auth core and front ends.
//!
//! This module provides:
//! - `Navigator`: the sink for every redirect the auth core performs
//! - `History`: an in-memory, browser-like history stack
//! - `RouteGuard`: the allow/deny gate in front of protected paths
//! - `LoginContext`: the read-once view of why the login screen is shown
//! - `Router`: runs the guard on every visit and owns the active view scope

pub mod guard;
pub mod history;
pub mod login;
pub mod router;

pub use guard::{GuardDecision, RouteGuard};
pub use history::{History, Location, LocationState, NavigateOptions, NavigationIntent, Navigator};
pub use login::{LoginContext, LoginNotice};
pub use router::{Router, Visit};

/// Landing page, also the destination after logout
pub const HOME_PATH: &str = "/";

/// Login view; every authentication detour ends here
pub const LOGIN_PATH: &str = "/login";

/// Paths that require a session unless configured otherwise
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &["/profile", "/posts/new"];
