//! Auth operations: the only code allowed to change the session.
//!
//! `AuthService` owns the session state, the credential store and the
//! navigator. `login`, `logout` and `handle_unauthorized` each persist the
//! credential change first, publish the new session second and navigate
//! last, so observers never see a session the store disagrees with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{interceptor, ApiClient, ApiError};
use crate::models::UserProfile;
use crate::navigation::{
    LocationState, LoginContext, NavigateOptions, Navigator, HOME_PATH, LOGIN_PATH,
};

use super::credentials::CredentialStore;
use super::session::{Credential, Session, SessionState, UserIdentity};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
}

pub struct AuthService {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    state: SessionState,
    /// Set once an unauthorized redirect has been issued; cleared when the
    /// login view consumes it or a new session starts.
    redirect_pending: AtomicBool,
}

impl AuthService {
    /// Build the service, restoring any credential left in `store`.
    ///
    /// A restored credential may already be expired; that is only found out
    /// when the first request using it is rejected.
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
        let initial = match store.load() {
            Ok(Some(credential)) => {
                debug!("Restored credential from store");
                Session::authenticated(credential, UserIdentity::restored())
            }
            Ok(None) => {
                debug!("No stored credential found");
                Session::anonymous()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read credential store, starting signed out");
                Session::anonymous()
            }
        };

        Self {
            api,
            store,
            navigator,
            state: SessionState::new(initial),
            redirect_pending: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// Consistent snapshot of the current session
    pub fn session(&self) -> Session {
        self.state.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.session().credential().cloned()
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.session().identity().cloned()
    }

    /// Receive every future session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Sign in and resume at `intended_path` (home when `None`).
    ///
    /// Fails with `Authentication` when the server rejects the pair,
    /// `Request` for any other failure status and `Protocol` when a
    /// successful response carries no token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        intended_path: Option<&str>,
    ) -> Result<UserIdentity, ApiError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "Username and password required".to_string(),
            ));
        }

        let response = match self.api.request_token(username, password).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login request failed");
                return Err(e);
            }
        };
        let status = response.status();

        if interceptor::is_rejection(status) {
            let body = response.text().await.unwrap_or_default();
            let detail = ApiError::server_detail(&body)
                .unwrap_or_else(|| "Invalid username or password".to_string());
            error!(%status, username, "Login rejected");
            self.handle_unauthorized();
            return Err(ApiError::Authentication(detail));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, username, "Login failed");
            return Err(login_failure(status, &body));
        }

        let body = response.text().await?;
        let credential = parse_token(&body)?;
        let identity = UserIdentity::from_login(username);

        self.install(credential, identity.clone())?;

        let target = intended_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(HOME_PATH);
        info!(username, target, "Login successful");
        self.navigator.navigate(target, NavigateOptions::replace());

        Ok(identity)
    }

    /// Sign out locally. No server round trip is needed.
    pub fn logout(&self) {
        let was_authenticated = self.clear(|_| true, false);
        self.redirect_pending.store(false, Ordering::SeqCst);
        info!(was_authenticated, "Logged out");
        self.navigator.navigate(HOME_PATH, NavigateOptions::replace());
    }

    /// End the session after the server rejected its credential and send the
    /// user to the login view.
    ///
    /// Safe to call from any number of in-flight requests: only the call
    /// that actually clears the session redirects. Once the session is
    /// anonymous this is a no-op, so it never overrides where the user has
    /// navigated since. Returns whether this call acted.
    pub fn handle_unauthorized(&self) -> bool {
        match self.credential() {
            Some(credential) => self.reject_credential(Some(&credential)),
            None => {
                debug!("Session already cleared, ignoring unauthorized signal");
                false
            }
        }
    }

    /// [`handle_unauthorized`](Self::handle_unauthorized) for a request that
    /// carried `rejected`.
    ///
    /// If a different credential is installed by now (the user signed in
    /// again while the request was in flight) the rejection is stale and is
    /// ignored. `None` means the request went out anonymously; that sends the
    /// user to the login view at most once per pending redirect.
    pub fn reject_credential(&self, rejected: Option<&Credential>) -> bool {
        match rejected {
            Some(rejected) => {
                let cleared = self.clear(|current| current == rejected, true);
                if cleared {
                    warn!("Session expired, redirecting to login");
                    self.navigator.navigate(
                        LOGIN_PATH,
                        NavigateOptions::replace().with_state(LocationState::session_expired()),
                    );
                }
                cleared
            }
            None => self.redirect_anonymous(),
        }
    }

    /// Replace the placeholder identity with the server's view of the user,
    /// provided `credential` is still the one installed.
    pub fn adopt_profile(&self, credential: &Credential, profile: &UserProfile) -> bool {
        let identity = UserIdentity::from_profile(profile);
        self.state.update(|session| {
            if session.credential() != Some(credential) || session.identity() == Some(&identity) {
                return false;
            }
            *session = session.with_identity(identity);
            true
        })
    }

    /// Consume the state the login view was opened with.
    ///
    /// Call once when the login view is shown. Any pending unauthorized
    /// redirect counts as delivered afterwards.
    pub fn take_login_context(&self) -> LoginContext {
        let location = self.navigator.current();
        let state = self.navigator.take_state();
        self.redirect_pending.store(false, Ordering::SeqCst);
        LoginContext::from_location(&location, state)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Persist then publish a new authenticated session.
    fn install(&self, credential: Credential, identity: UserIdentity) -> Result<(), ApiError> {
        let mut saved = Ok(());
        self.state.update(|session| match self.store.save(&credential) {
            Ok(()) => {
                *session = Session::authenticated(credential, identity);
                true
            }
            Err(e) => {
                saved = Err(e);
                false
            }
        });
        self.redirect_pending.store(false, Ordering::SeqCst);
        saved.map_err(|e| {
            error!(error = %e, "Failed to persist credential");
            ApiError::Storage(format!("{:#}", e))
        })
    }

    /// Clear the session if its credential satisfies `matches`.
    ///
    /// The store is always cleared when this runs against an anonymous
    /// session too, so a stray file or keychain entry cannot outlive a
    /// logout. Returns whether a credential was removed from memory.
    ///
    /// With `mark_pending` the redirect flag is raised while the session is
    /// still locked, so an anonymous rejection racing this call cannot issue
    /// its own redirect over the one that follows.
    fn clear<F>(&self, matches: F, mark_pending: bool) -> bool
    where
        F: FnOnce(&Credential) -> bool,
    {
        self.state.update(|session| {
            let remove = match session.credential() {
                Some(current) => matches(current),
                None => true,
            };
            if !remove {
                return false;
            }
            let had_credential = session.is_authenticated();
            if had_credential && mark_pending {
                self.redirect_pending.store(true, Ordering::SeqCst);
            }
            if let Err(e) = self.store.clear() {
                error!(error = %e, "Failed to remove stored credential");
            }
            *session = Session::anonymous();
            had_credential
        })
    }

    /// A request without any credential was rejected: send the user to the
    /// login view once, unless they are already there or on their way.
    fn redirect_anonymous(&self) -> bool {
        if self.navigator.current().path == LOGIN_PATH {
            return false;
        }
        if self
            .redirect_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        info!("Anonymous request rejected, redirecting to login");
        self.navigator.navigate(LOGIN_PATH, NavigateOptions::replace());
        true
    }
}

/// Error for a non-success, non-rejection token response
fn login_failure(status: StatusCode, body: &str) -> ApiError {
    ApiError::Request {
        status: status.as_u16(),
        message: ApiError::server_detail(body)
            .unwrap_or_else(|| format!("Login failed with status: {}", status.as_u16())),
    }
}

/// Extract the access token from a successful token response body
fn parse_token(body: &str) -> Result<Credential, ApiError> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|_| ApiError::Protocol("server omitted the credential".to_string()))?;

    if let Some(ref token_type) = parsed.token_type {
        if !token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %token_type, "Unexpected token type, treating as bearer");
        }
    }

    parsed
        .access_token
        .filter(|t| !t.trim().is_empty())
        .map(Credential::new)
        .ok_or_else(|| ApiError::Protocol("server omitted the credential".to_string()))
}
