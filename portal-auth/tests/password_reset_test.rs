mod common;

use axum::http::StatusCode;
use common::{link_param, TestApp, TEST_APP_URL};
use portal_auth::services::SentEmail;
use portal_auth::utils::{verify_password, Password, PasswordHashString};
use serde_json::json;

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    let user = app.add_member("member@example.com");

    let (status, _) = app
        .post_json(
            "/auth/password-reset/request",
            json!({ "email": "Member@Example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let token = app.last_secret_for("member@example.com");

    let (status, body) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": token,
                "password": "Tr0ub4dor&3XyZ",
                "confirm_password": "Tr0ub4dor&3XyZ"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let hash = app.users.get(user.id).unwrap().password_hash.unwrap();
    let password = Password::new("Tr0ub4dor&3XyZ".to_string());
    assert!(verify_password(&password, &PasswordHashString::new(hash)).is_ok());

    // Link is spent.
    let (status, _) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": token,
                "password": "An0ther&Secret",
                "confirm_password": "An0ther&Secret"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_request_for_unknown_email_is_indistinguishable() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    let (known_status, known_body) = app
        .post_json(
            "/auth/password-reset/request",
            json!({ "email": "member@example.com" }),
        )
        .await;
    let (unknown_status, unknown_body) = app
        .post_json(
            "/auth/password-reset/request",
            json!({ "email": "ghost@example.com" }),
        )
        .await;

    assert_eq!(known_status, unknown_status);
    assert_eq!(known_body, unknown_body);
    assert_eq!(app.mailer.outbox().len(), 1);
    assert_eq!(app.store.records().len(), 1);
}

#[tokio::test]
async fn test_weak_password_is_rejected_without_spending_token() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json(
        "/auth/password-reset/request",
        json!({ "email": "member@example.com" }),
    )
    .await;
    let token = app.last_secret_for("member@example.com");

    let (status, body) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": token,
                "password": "alllowercase",
                "confirm_password": "alllowercase"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Add uppercase letters"));

    assert_eq!(app.store.records().len(), 1);
}

#[tokio::test]
async fn test_mismatched_confirmation_fails_validation() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": "abc",
                "password": "Tr0ub4dor&3XyZ",
                "confirm_password": "Tr0ub4dor&3XyQ"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_reset_link_expires_after_one_hour() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json(
        "/auth/password-reset/request",
        json!({ "email": "member@example.com" }),
    )
    .await;
    let token = app.last_secret_for("member@example.com");

    app.clock.advance(chrono::Duration::minutes(61));

    let (status, _) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": token,
                "password": "Tr0ub4dor&3XyZ",
                "confirm_password": "Tr0ub4dor&3XyZ"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_emailed_reset_link_opens_reset_page() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json(
        "/auth/password-reset/request",
        json!({ "email": "member@example.com" }),
    )
    .await;

    let Some(SentEmail::PasswordReset { link, .. }) = app.mailer.last_to("member@example.com")
    else {
        panic!("no reset email sent");
    };
    assert!(link.starts_with(&format!("{TEST_APP_URL}/reset-password?")));

    // The page posts the token from its query string back to the API.
    let token = link_param(&link, "token").unwrap();
    let (status, _) = app
        .post_json(
            "/auth/password-reset/confirm",
            json!({
                "token": token,
                "password": "Tr0ub4dor&3XyZ",
                "confirm_password": "Tr0ub4dor&3XyZ"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
