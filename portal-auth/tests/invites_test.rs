mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use common::{link_param, TestApp, TEST_ADMIN_API_KEY, TEST_APP_URL};
use portal_auth::models::VerificationRecord;
use portal_auth::services::{Clock, SentEmail, VerificationStore, INVALID_OR_EXPIRED};
use serde_json::json;

fn admin_request(uri: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-admin-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn invite(app: &TestApp, email: &str, invited_by: &str) -> (StatusCode, serde_json::Value) {
    app.send(admin_request(
        "/auth/admin/invites",
        Some(TEST_ADMIN_API_KEY),
        json!({ "email": email, "invited_by": invited_by }),
    ))
    .await
}

#[tokio::test]
async fn test_invite_and_accept() {
    let app = TestApp::new();

    let (status, body) = invite(&app, "guest@example.com", "admin-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "guest@example.com");
    assert_eq!(body["invited_by"], "admin-1");

    let token = app.last_secret_for("guest@example.com");

    let (status, body) = app
        .post_json("/auth/invites/accept", json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "guest@example.com");
    assert_eq!(body["invited_by"], "admin-1");

    let (status, body) = app
        .post_json("/auth/invites/accept", json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], INVALID_OR_EXPIRED);
}

#[tokio::test]
async fn test_emailed_invite_link_opens_accept_page() {
    let app = TestApp::new();
    invite(&app, "guest@example.com", "admin-1").await;

    let Some(SentEmail::Invite { link, .. }) = app.mailer.last_to("guest@example.com") else {
        panic!("no invite email sent");
    };
    assert!(link.starts_with(&format!("{TEST_APP_URL}/accept-invite?")));

    let token = link_param(&link, "token").unwrap();
    let (status, body) = app
        .post_json("/auth/invites/accept", json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "guest@example.com");
}

#[tokio::test]
async fn test_repeated_invites_all_stay_valid() {
    let app = TestApp::new();

    invite(&app, "guest@example.com", "admin-1").await;
    let first = app.last_secret_for("guest@example.com");
    invite(&app, "guest@example.com", "admin-1").await;
    let second = app.last_secret_for("guest@example.com");

    assert_eq!(app.store.records().len(), 2);

    for token in [first, second] {
        let (status, _) = app
            .post_json("/auth/invites/accept", json!({ "token": token }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_invite_expires_after_seven_days() {
    let app = TestApp::new();

    invite(&app, "guest@example.com", "admin-1").await;
    let token = app.last_secret_for("guest@example.com");

    app.clock.advance(Duration::days(7) + Duration::seconds(1));

    let (status, _) = app
        .post_json("/auth/invites/accept", json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrupted_invite_record_is_rejected() {
    let app = TestApp::new();
    let expires = app.clock.now() + Duration::days(1);
    app.store
        .insert(&VerificationRecord::new(
            "invite:guest@example.com".to_string(),
            "feedface".to_string(),
            expires,
        ))
        .await
        .unwrap();

    let (status, body) = app
        .post_json("/auth/invites/accept", json!({ "token": "feedface" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], INVALID_OR_EXPIRED);
}

#[tokio::test]
async fn test_invite_rejects_colon_in_inviter() {
    let app = TestApp::new();

    let (status, _) = invite(&app, "guest@example.com", "team:admin").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.store.records().is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let app = TestApp::new();

    let (status, _) = app
        .send(admin_request(
            "/auth/admin/invites",
            None,
            json!({ "email": "guest@example.com", "invited_by": "admin-1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(admin_request(
            "/auth/admin/tokens/cleanup",
            Some("wrong-key"),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cleanup_removes_expired_records() {
    let app = TestApp::new();
    app.add_member("member@example.com");

    app.post_json("/auth/2fa/send", json!({ "email": "member@example.com" }))
        .await;
    invite(&app, "guest@example.com", "admin-1").await;

    app.clock.advance(Duration::hours(1));

    let (status, body) = app
        .send(admin_request(
            "/auth/admin/tokens/cleanup",
            Some(TEST_ADMIN_API_KEY),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
    assert_eq!(app.store.records().len(), 1);
}
