mod common;

use axum::http::StatusCode;
use common::TestApp;
use portal_auth::services::INVALID_OR_EXPIRED;
use serde_json::json;

#[tokio::test]
async fn test_send_and_verify_code() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    let (status, _) = app
        .post_json("/auth/2fa/send", json!({ "email": "member@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let code = app.last_secret_for("member@example.com");
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let (status, body) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "member@example.com", "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let (status, body) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "member@example.com", "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], INVALID_OR_EXPIRED);
}

#[tokio::test]
async fn test_code_expires_after_ten_minutes() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json("/auth/2fa/send", json!({ "email": "member@example.com" }))
        .await;
    let code = app.last_secret_for("member@example.com");

    app.clock
        .advance(chrono::Duration::minutes(10) + chrono::Duration::seconds(1));

    let (status, _) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "member@example.com", "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_code_for_one_member_does_not_work_for_another() {
    let app = TestApp::new();
    app.add_member("alice@example.com");
    app.add_member("bob@example.com");

    app.post_json("/auth/2fa/send", json!({ "email": "alice@example.com" }))
        .await;
    let code = app.last_secret_for("alice@example.com");

    let (status, _) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "bob@example.com", "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Alice's code survives the failed attempt.
    let (status, _) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "alice@example.com", "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_new_code_replaces_old_one() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json("/auth/2fa/send", json!({ "email": "member@example.com" }))
        .await;
    app.post_json("/auth/2fa/send", json!({ "email": "member@example.com" }))
        .await;

    let codes: Vec<_> = app
        .store
        .records()
        .into_iter()
        .filter(|r| r.identifier == "2fa:member@example.com")
        .collect();
    assert_eq!(codes.len(), 1);
}

#[tokio::test]
async fn test_send_for_unknown_email_issues_nothing() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json("/auth/2fa/send", json!({ "email": "ghost@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.records().is_empty());
    assert!(app.mailer.outbox().is_empty());
}

#[tokio::test]
async fn test_malformed_code_fails_validation() {
    let app = TestApp::new();

    let (status, _) = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "email": "member@example.com", "code": "12ab56" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
