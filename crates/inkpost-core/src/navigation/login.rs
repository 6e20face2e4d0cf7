use super::history::{Location, LocationState};

/// Why the login view is being shown, if there is something to say about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginNotice {
    SessionExpired,
    ValidationSuccess,
    SignupSuccess,
}

impl LoginNotice {
    pub fn message(&self) -> &'static str {
        match self {
            LoginNotice::SessionExpired => "Your session has expired. Please sign in again.",
            LoginNotice::ValidationSuccess => {
                "Thank you for signing up! Please sign in with your new credentials."
            }
            LoginNotice::SignupSuccess => {
                "Sign up initiated! Please check your email or sign in if validation complete."
            }
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, LoginNotice::SessionExpired)
    }
}

/// Everything the login view needs to know on arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginContext {
    /// Where to go after a successful login; `None` means home
    pub intended_path: Option<String>,
    pub notice: Option<LoginNotice>,
}

impl LoginContext {
    /// Build the context from the login location and the state taken from it.
    pub fn from_location(location: &Location, state: Option<LocationState>) -> Self {
        let state = state.unwrap_or_default();

        let notice = if state.session_expired {
            Some(LoginNotice::SessionExpired)
        } else if state.validation_success {
            Some(LoginNotice::ValidationSuccess)
        } else if location.query_param("signup") == Some("success") {
            Some(LoginNotice::SignupSuccess)
        } else {
            None
        };

        Self {
            intended_path: state.from.map(|intent| intent.target_path),
            notice,
        }
    }

    pub fn intended_path(&self) -> Option<&str> {
        self.intended_path.as_deref()
    }
}
