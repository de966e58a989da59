//! Register and login handler tests.

use tonic::{Code, Request};

use keeper_proto::auth_service_server::AuthService;
use keeper_proto::{LoginRequest, RegisterRequest};
use keeper_storage::Store;

use super::super::common::*;

fn register_request(username: &str, password: &str) -> Request<RegisterRequest> {
    Request::new(RegisterRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn login_request(username: &str, password: &str) -> Request<LoginRequest> {
    Request::new(LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[tokio::test]
async fn handler_register_stores_hashed_password() {
    let (server, _) = create_test_server().await;

    let resp = server
        .register(register_request("alice", "s3cret"))
        .await
        .unwrap()
        .into_inner();
    assert!(!resp.message.is_empty());

    let user = server.store.get_user_by_name("alice").await.unwrap();
    assert_ne!(user.password_hash, "s3cret");
    assert!(user.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn handler_register_duplicate_is_already_exists() {
    let (server, _) = create_test_server().await;
    server
        .register(register_request("alice", "one"))
        .await
        .unwrap();

    let err = server
        .register(register_request("alice", "two"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn handler_register_and_login_reject_empty_credentials() {
    let (server, _) = create_test_server().await;

    for (username, password) in [("", "pw"), ("  ", "pw"), ("alice", "")] {
        let err = server
            .register(register_request(username, password))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = server
            .login(login_request(username, password))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
}

#[tokio::test]
async fn handler_login_issues_token_for_user() {
    let (server, _) = create_test_server().await;
    let user_id = create_test_user(&server, "alice").await;

    let resp = server
        .login(login_request("alice", "correct horse"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(resp.user_id, user_id.0);
    let claims = server.tokens.verify(&resp.token).unwrap();
    assert_eq!(claims.sub, "alice");
}

#[tokio::test]
async fn handler_login_failures_are_indistinguishable() {
    let (server, _) = create_test_server().await;
    create_test_user(&server, "alice").await;

    let wrong_password = server
        .login(login_request("alice", "wrong"))
        .await
        .unwrap_err();
    let unknown_user = server
        .login(login_request("nobody", "correct horse"))
        .await
        .unwrap_err();

    assert_eq!(wrong_password.code(), Code::Unauthenticated);
    assert_eq!(unknown_user.code(), Code::Unauthenticated);
    assert_eq!(wrong_password.message(), unknown_user.message());
}
