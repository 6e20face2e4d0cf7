//! REST API access for the blog server.
//!
//! This module provides:
//! - `ApiClient`: transport and endpoint layout, no session knowledge
//! - `policy`: attaches `Authorization: Bearer <token>` from a session snapshot
//! - `interceptor`: turns 401/403 into a session reset plus redirect
//! - `Gateway`: the session-aware calls views make
//! - `ViewScope`: per-view cancellation so stale responses are dropped

pub mod client;
pub mod error;
pub mod gateway;
pub mod interceptor;
pub mod policy;
pub mod scope;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::Gateway;
pub use scope::ViewScope;
