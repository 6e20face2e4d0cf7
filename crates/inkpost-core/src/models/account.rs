use serde::{Deserialize, Serialize};

/// Minimum password length accepted by the sign-up form
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Profile returned by `GET /users/me/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Sign-up form contents
#[derive(Debug, Clone, Default)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub password: String,
    pub confirm_password: String,
}

/// Body for `POST /users/`
#[derive(Debug, Serialize)]
pub(crate) struct SignUpRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub given_name: &'a str,
    pub family_name: &'a str,
    pub password: &'a str,
}

impl SignUp {
    /// Local checks run before anything is sent
    pub fn validate(&self) -> Result<(), String> {
        if self.password != self.confirm_password {
            return Err("Passwords do not match.".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            ));
        }
        if self.given_name.trim().is_empty() || self.family_name.trim().is_empty() {
            return Err("Please fill in your first and last name.".to_string());
        }
        if self.username.trim().is_empty() || self.email.trim().is_empty() {
            return Err("Username and email are required.".to_string());
        }
        Ok(())
    }

    pub(crate) fn request(&self) -> SignUpRequest<'_> {
        SignUpRequest {
            username: self.username.trim(),
            email: self.email.trim(),
            given_name: self.given_name.trim(),
            family_name: self.family_name.trim(),
            password: &self.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SignUp {
        SignUp {
            username: "alice".into(),
            email: "alice@example.com".into(),
            given_name: "Alice".into(),
            family_name: "Liddell".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
        }
    }

    #[test]
    fn test_valid_sign_up() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_sign_up_checks_in_form_order() {
        let mut f = form();
        f.confirm_password = "other".into();
        assert_eq!(f.validate().unwrap_err(), "Passwords do not match.");

        let mut f = form();
        f.password = "abc".into();
        f.confirm_password = "abc".into();
        assert_eq!(
            f.validate().unwrap_err(),
            "Password must be at least 6 characters long."
        );

        let mut f = form();
        f.family_name = " ".into();
        assert_eq!(
            f.validate().unwrap_err(),
            "Please fill in your first and last name."
        );
    }

    #[test]
    fn test_request_body() {
        let f = form();
        let json = serde_json::to_value(f.request()).unwrap();
        assert_eq!(json["given_name"], "Alice");
        assert!(json.get("confirm_password").is_none());
    }

    #[test]
    fn test_full_name() {
        let mut profile = UserProfile {
            username: "alice".into(),
            email: None,
            given_name: Some("Alice".into()),
            family_name: None,
        };
        assert_eq!(profile.full_name().as_deref(), Some("Alice"));
        profile.given_name = None;
        assert!(profile.full_name().is_none());
    }
}
