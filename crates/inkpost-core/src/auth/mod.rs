//! Authentication module for managing the user session and its credential.
//!
//! This module provides:
//! - `Session` / `SessionState`: the observable, all-or-nothing session value
//! - `AuthService`: `login`, `logout` and `handle_unauthorized`, the only writers
//! - `CredentialStore`: durable storage for the bearer token (keychain, file, memory)
//!
//! Tokens carry no expiry the client can read; a session ends when the user
//! logs out or the server rejects the token.

pub mod credentials;
pub mod service;
pub mod session;

pub use credentials::{CredentialStore, FileStore, KeyringStore, MemoryStore};
pub use service::AuthService;
pub use session::{Credential, IdentitySource, Session, SessionSnapshot, SessionState, UserIdentity};
