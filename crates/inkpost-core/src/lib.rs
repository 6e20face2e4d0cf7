//! Client session core for the inkpost blog.
//!
//! Owns the signed-in state of a blog client: where the bearer token is
//! stored, how it is attached to outgoing requests, what happens when the
//! server rejects it, and which views are reachable without it. Front ends
//! (the `inkpost` CLI, a desktop shell) drive everything through
//! [`AuthService`], [`Gateway`] and [`Router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;
pub mod utils;

pub use api::{ApiClient, ApiError, Gateway, ViewScope};
pub use auth::{AuthService, Credential, CredentialStore, Session, UserIdentity};
pub use config::{Config, CredentialBackend};
pub use navigation::{History, LoginContext, LoginNotice, Navigator, RouteGuard, Router, Visit};
