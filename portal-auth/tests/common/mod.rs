//! Shared setup for router-level tests: in-memory store and directory, a
//! manual clock and a recording mailer.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use portal_auth::{
    build_router,
    models::UserAccount,
    services::{
        AccountService, InMemoryUserDirectory, InMemoryVerificationStore, ManualClock,
        MockEmailService, TokenService,
    },
    AppState,
};
use service_core::middleware::rate_limit::{create_ip_rate_limiter, RateLimitPolicy};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";
pub const TEST_APP_URL: &str = "http://localhost:3000";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryVerificationStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub mailer: Arc<MockEmailService>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(RateLimitPolicy::new(1000, 60), RateLimitPolicy::new(1000, 60))
    }

    pub fn with_limits(auth: RateLimitPolicy, api: RateLimitPolicy) -> Self {
        let _ = tracing_subscriber_init();

        let store = Arc::new(InMemoryVerificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let mailer = Arc::new(MockEmailService::new());
        let clock = Arc::new(ManualClock::default());

        let tokens = TokenService::new(store.clone(), users.clone(), clock.clone());
        let accounts = AccountService::new(
            tokens,
            users.clone(),
            mailer.clone(),
            clock.clone(),
            TEST_APP_URL.to_string(),
        );

        let state = AppState {
            service_name: "portal-auth".to_string(),
            service_version: "test".to_string(),
            accounts,
            admin_api_key: TEST_ADMIN_API_KEY.to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            auth_rate_limiter: create_ip_rate_limiter(auth),
            code_rate_limiter: create_ip_rate_limiter(auth),
            api_rate_limiter: create_ip_rate_limiter(api),
        };

        Self {
            router: build_router(state.clone()),
            state,
            store,
            users,
            mailer,
            clock,
        }
    }

    /// Register an unverified member directly in the directory.
    pub fn add_member(&self, email: &str) -> UserAccount {
        let user = UserAccount::new(email.to_string(), Some("Test Member".to_string()));
        self.users.insert(user.clone());
        user
    }

    /// Most recent token or code mailed to `email`.
    pub fn last_secret_for(&self, email: &str) -> String {
        self.mailer
            .last_secret_to(email)
            .unwrap_or_else(|| panic!("no email sent to {}", email))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(json_request(uri, body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

/// Query value of `key` in an emailed link.
pub fn link_param(link: &str, key: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn tracing_subscriber_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init()
}
