//! Session-aware API access for views.
//!
//! Every call follows the same sequence: snapshot the session, attach the
//! credential through the authorization policy, send under the caller's
//! `ViewScope`, run the unauthorized interceptor, and only then decode.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::{AuthService, IdentitySource, UserIdentity};
use crate::models::{NewPost, Post, SignUp, UserProfile};
use crate::navigation::{LocationState, NavigateOptions, HOME_PATH, LOGIN_PATH};

use super::{interceptor, policy, ApiError, ViewScope};

const PROFILE_PATH: &str = "/users/me/";
const POSTS_PATH: &str = "/posts/";
const USERS_PATH: &str = "/users/";
const VALIDATE_PATH: &str = "/users/validate";

/// Byline used when nobody is signed in
const UNKNOWN_AUTHOR: &str = "Unknown Author";

#[derive(Clone)]
pub struct Gateway {
    auth: Arc<AuthService>,
}

impl Gateway {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Send with the current credential attached and intercept rejections
    async fn send(
        &self,
        builder: RequestBuilder,
        scope: &ViewScope,
        fallback: &str,
    ) -> Result<Response, ApiError> {
        let session = self.auth.session();
        let builder = policy::authorize(builder, &session);

        let response = scope
            .run(async move { builder.send().await.map_err(ApiError::from) })
            .await?;

        interceptor::intercept(response, session.credential(), &self.auth, fallback).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        scope: &ViewScope,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(builder, scope, fallback).await?;
        let url = response.url().path().to_string();
        scope
            .run(async move {
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ApiError::Protocol(format!("Failed to parse response from {}: {}", url, e)))
            })
            .await
    }

    // ===== Account =====

    /// Fetch the signed-in user's profile and adopt it as the session identity
    pub async fn fetch_profile(&self, scope: &ViewScope) -> Result<UserProfile, ApiError> {
        let sent_with = self.auth.credential();
        let builder = self.auth.api().request(Method::GET, PROFILE_PATH);
        let profile: UserProfile = self
            .send_json(builder, scope, "Failed to fetch profile")
            .await?;

        if let Some(ref credential) = sent_with {
            self.auth.adopt_profile(credential, &profile);
        }
        Ok(profile)
    }

    /// Register a new account, then send the user to the login view
    pub async fn sign_up(&self, form: &SignUp, scope: &ViewScope) -> Result<(), ApiError> {
        form.validate().map_err(ApiError::InvalidInput)?;

        let builder = self
            .auth
            .api()
            .request(Method::POST, USERS_PATH)
            .json(&form.request());
        self.send(builder, scope, "Sign up failed with status").await?;

        info!(username = %form.username.trim(), "Sign up submitted");
        self.auth
            .navigator()
            .navigate(&format!("{}?signup=success", LOGIN_PATH), NavigateOptions::push());
        Ok(())
    }

    /// Confirm an account with the challenge token from the validation link
    pub async fn validate_account(&self, challenge: &str, scope: &ViewScope) -> Result<(), ApiError> {
        let challenge = challenge.trim();
        if challenge.is_empty() {
            return Err(ApiError::InvalidInput(
                "Challenge token missing from URL.".to_string(),
            ));
        }

        let builder = self
            .auth
            .api()
            .request(Method::POST, VALIDATE_PATH)
            .json(&serde_json::json!({ "challenge": challenge }));
        self.send(builder, scope, "Validation failed with status").await?;

        info!("Account validated");
        self.auth.navigator().navigate(
            LOGIN_PATH,
            NavigateOptions::push().with_state(LocationState::validation_success()),
        );
        Ok(())
    }

    // ===== Posts =====

    /// List posts. Works signed out; the credential is attached when present.
    pub async fn list_posts(&self, scope: &ViewScope) -> Result<Vec<Post>, ApiError> {
        let builder = self.auth.api().request(Method::GET, POSTS_PATH);
        let posts: Vec<Post> = self.send_json(builder, scope, "Failed to fetch posts").await?;
        debug!(count = posts.len(), "Fetched posts");
        Ok(posts)
    }

    pub async fn get_post(&self, id: &str, scope: &ViewScope) -> Result<Post, ApiError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::InvalidInput("Post id is required.".to_string()));
        }
        let builder = self
            .auth
            .api()
            .request(Method::GET, &format!("{}{}", POSTS_PATH, id));
        self.send_json(builder, scope, "Failed to fetch post").await
    }

    /// Publish a post as the signed-in user.
    ///
    /// A session restored from the store knows no name yet, so the profile
    /// is fetched first to fill the byline.
    pub async fn create_post(&self, draft: NewPost, scope: &ViewScope) -> Result<Post, ApiError> {
        draft.validate().map_err(ApiError::InvalidInput)?;

        let restored = self
            .auth
            .identity()
            .is_some_and(|identity| identity.source == IdentitySource::Restored);
        if restored {
            match self.fetch_profile(scope).await {
                Ok(_) => {}
                Err(e) if e.is_intercepted() || matches!(e, ApiError::Cancelled) => return Err(e),
                Err(e) => warn!(error = %e, "Could not load profile, posting without an author name"),
            }
        }
        let author = author_name(self.auth.identity().as_ref());

        let mut form = Form::new()
            .text("title", draft.title)
            .text("snippet", draft.snippet)
            .text("content", draft.content)
            .text("date", draft.date.format("%Y-%m-%d").to_string())
            .text("author", author);

        if let Some(image) = draft.image {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.mime_type)
                .map_err(|_| {
                    ApiError::InvalidInput(format!("Unsupported image type: {}", image.mime_type))
                })?;
            form = form.part("image_file", part);
        }

        let builder = self
            .auth
            .api()
            .request(Method::POST, POSTS_PATH)
            .multipart(form);
        let post: Post = self.send_json(builder, scope, "Failed to create post").await?;

        info!(id = %post.id, title = %post.title, "Post created");
        self.auth.navigator().navigate(HOME_PATH, NavigateOptions::push());
        Ok(post)
    }
}

/// Byline for a new post. A placeholder identity never reaches the server.
fn author_name(identity: Option<&UserIdentity>) -> String {
    match identity {
        Some(identity) if identity.source != IdentitySource::Restored => {
            identity.display_name().to_string()
        }
        _ => UNKNOWN_AUTHOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_name() {
        assert_eq!(author_name(None), UNKNOWN_AUTHOR);
        assert_eq!(author_name(Some(&UserIdentity::restored())), UNKNOWN_AUTHOR);
        assert_eq!(author_name(Some(&UserIdentity::from_login("alice"))), "alice");
    }
}
