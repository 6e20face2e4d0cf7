use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::UserProfile;

/// Opaque bearer token issued by the token endpoint.
///
/// The client never inspects the token; expiry is only discovered when a
/// request is rejected.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where the current identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Read back from the credential store at startup; nothing is known
    /// beyond the presence of a token.
    Restored,
    /// Echo of the identifier typed at login.
    Login,
    /// Returned by the server's profile endpoint.
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserIdentity {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub source: IdentitySource,
}

impl UserIdentity {
    pub fn restored() -> Self {
        Self {
            username: None,
            email: None,
            full_name: None,
            source: IdentitySource::Restored,
        }
    }

    pub fn from_login(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            email: None,
            full_name: None,
            source: IdentitySource::Login,
        }
    }

    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            username: Some(profile.username.clone()),
            email: profile.email.clone(),
            full_name: profile.full_name(),
            source: IdentitySource::Profile,
        }
    }

    /// Name suitable for a header bar or a post byline
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Signed-in user")
    }
}

/// Immutable view of the authentication state.
///
/// Credential and identity are only ever set or cleared together, so
/// `identity.is_some() == credential.is_some()` holds for every value
/// built through the constructors below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    credential: Option<Credential>,
    identity: Option<UserIdentity>,
    established_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(credential: Credential, identity: UserIdentity) -> Self {
        Self {
            credential: Some(credential),
            identity: Some(identity),
            established_at: Some(Utc::now()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.established_at
    }

    /// Swap the identity while keeping the credential. No-op on an
    /// anonymous session.
    pub(crate) fn with_identity(&self, identity: UserIdentity) -> Self {
        match self.credential {
            Some(_) => Self {
                identity: Some(identity),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    /// Serializable summary for frontends; never includes the token.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_authenticated: self.is_authenticated(),
            identity: self.identity.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub identity: Option<UserIdentity>,
}

/// Observable holder for the current [`Session`].
///
/// Writers replace the whole value at once, so readers always see a
/// consistent credential/identity pair. Only `AuthService` holds one.
pub struct SessionState {
    tx: watch::Sender<Session>,
}

impl SessionState {
    pub fn new(initial: Session) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Apply `f` under the channel's write lock. Subscribers are notified
    /// only when `f` returns true.
    pub(crate) fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Session) -> bool,
    {
        self.tx.send_if_modified(f)
    }
}
