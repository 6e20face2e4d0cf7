//! Integration tests for login, logout and the login detour

use std::sync::Arc;

use inkpost_core::auth::MemoryStore;
use inkpost_core::navigation::{History, LoginNotice, Navigator, LOGIN_PATH};
use inkpost_core::{ApiClient, ApiError, AuthService, Credential, CredentialStore, RouteGuard, Router, Visit};
use mockito::{Matcher, Server};

fn auth_service(server: &Server, store: Arc<MemoryStore>, history: Arc<History>) -> Arc<AuthService> {
    let api = ApiClient::new(&server.url()).expect("client should build");
    Arc::new(AuthService::new(api, store, history))
}

#[tokio::test]
async fn login_success_stores_credential_and_navigates() {
    //* Given
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("username".into(), "alice".into()),
            Matcher::UrlEncoded("password".into(), "secret1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "tok123", "token_type": "bearer"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let history = Arc::new(History::new(LOGIN_PATH));
    let auth = auth_service(&server, store.clone(), history.clone());
    let mut changes = auth.subscribe();

    //* When
    let identity = auth
        .login("alice", "secret1", Some("/profile"))
        .await
        .expect("login should succeed");

    //* Then
    token_mock.assert_async().await;
    assert_eq!(identity.username.as_deref(), Some("alice"));
    assert!(auth.is_authenticated());
    assert_eq!(auth.credential(), Some(Credential::new("tok123")));
    assert_eq!(store.load().unwrap(), Some(Credential::new("tok123")));
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_authenticated());

    // The login entry was replaced, so "back" cannot return to the form
    assert_eq!(history.current().path, "/profile");
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn login_defaults_to_home() {
    //* Given
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok123"}"#)
        .create_async()
        .await;
    let history = Arc::new(History::new(LOGIN_PATH));
    let auth = auth_service(&server, Arc::new(MemoryStore::new()), history.clone());

    //* When
    auth.login("alice", "secret1", None).await.expect("login should succeed");

    //* Then
    assert_eq!(history.current().path, "/");
}

#[tokio::test]
async fn login_rejected_is_authentication_error() {
    //* Given
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .with_status(401)
        .with_body(r#"{"detail": "Incorrect username or password"}"#)
        .expect(1)
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    let history = Arc::new(History::new(LOGIN_PATH));
    let auth = auth_service(&server, store.clone(), history.clone());

    //* When
    let err = auth.login("alice", "wrong", None).await.unwrap_err();

    //* Then
    token_mock.assert_async().await;
    assert!(matches!(err, ApiError::Authentication(ref detail) if detail == "Incorrect username or password"));
    assert_eq!(err.to_string(), "Incorrect username or password");
    assert!(err.is_intercepted());
    assert!(!auth.is_authenticated());
    assert!(store.load().unwrap().is_none());
    // Already on the login view: no extra redirect
    assert_eq!(history.current().path, LOGIN_PATH);
    assert_eq!(history.navigation_count(), 0);
}

#[tokio::test]
async fn login_server_error_carries_detail() {
    //* Given
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(500)
        .with_body(r#"{"detail": "Database unavailable"}"#)
        .create_async()
        .await;
    let history = Arc::new(History::new(LOGIN_PATH));
    let auth = auth_service(&server, Arc::new(MemoryStore::new()), history.clone());

    //* When
    let err = auth.login("alice", "secret1", None).await.unwrap_err();

    //* Then
    assert!(matches!(err, ApiError::Request { status: 500, .. }));
    assert_eq!(err.user_message().as_deref(), Some("Database unavailable"));
    assert!(!err.is_intercepted());
    assert_eq!(history.navigation_count(), 0);
}

#[tokio::test]
async fn login_without_token_is_protocol_error() {
    //* Given
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"token_type": "bearer"}"#)
        .create_async()
        .await;
    let store = Arc::new(MemoryStore::new());
    let history = Arc::new(History::new(LOGIN_PATH));
    let auth = auth_service(&server, store.clone(), history.clone());

    //* When
    let err = auth.login("alice", "secret1", Some("/profile")).await.unwrap_err();

    //* Then
    assert!(matches!(err, ApiError::Protocol(ref m) if m == "server omitted the credential"));
    assert!(!auth.is_authenticated());
    assert!(store.load().unwrap().is_none());
    assert_eq!(history.current().path, LOGIN_PATH);
}

#[tokio::test]
async fn guard_detour_resumes_at_intended_path() {
    //* Given
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok123", "token_type": "bearer"}"#)
        .create_async()
        .await;
    let history = Arc::new(History::new("/"));
    let auth = auth_service(&server, Arc::new(MemoryStore::new()), history.clone());
    let router = Router::new(auth.clone(), RouteGuard::default());

    //* When
    let visit = router.visit("/profile");
    let context = auth.take_login_context();
    auth.login("alice", "secret1", context.intended_path())
        .await
        .expect("login should succeed");

    //* Then
    assert!(matches!(visit, Visit::Redirected { ref to } if to.path == LOGIN_PATH));
    assert_eq!(context.intended_path(), Some("/profile"));
    assert!(context.notice.is_none());
    assert_eq!(history.current().path, "/profile");
    assert!(matches!(router.visit("/profile"), Visit::Render { .. }));

    // The remembered destination is gone once consumed
    assert!(auth.take_login_context().intended_path().is_none());
}

#[tokio::test]
async fn logout_clears_store() {
    //* Given
    let server = Server::new_async().await;
    let store = Arc::new(MemoryStore::with_credential(Credential::new("tok123")));
    let history = Arc::new(History::new("/profile"));
    let auth = auth_service(&server, store.clone(), history.clone());
    assert!(auth.is_authenticated());

    //* When
    auth.logout();

    //* Then
    assert!(!auth.is_authenticated());
    assert!(store.load().unwrap().is_none());
    assert_eq!(history.current().path, "/");
    let context = auth.take_login_context();
    assert_ne!(context.notice, Some(LoginNotice::SessionExpired));
}
