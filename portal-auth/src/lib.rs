pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::middleware::ADMIN_API_KEY_HEADER;
use crate::services::AccountService;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::password::check_strength,
        handlers::password::generate_password,
        handlers::verification::resend_verification,
        handlers::verification::verify_email,
        handlers::password_reset::request_password_reset,
        handlers::password_reset::confirm_password_reset,
        handlers::two_factor::send_code,
        handlers::two_factor::verify_code,
        handlers::invites::accept_invite,
        handlers::admin::create_invite,
        handlers::admin::cleanup_tokens,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::account::PasswordStrengthRequest,
            dtos::account::GeneratedPasswordResponse,
            dtos::account::EmailRequest,
            dtos::account::PasswordResetConfirm,
            dtos::account::TwoFactorVerifyRequest,
            dtos::account::TwoFactorVerifyResponse,
            dtos::account::CreateInviteRequest,
            dtos::account::CreateInviteResponse,
            dtos::account::AcceptInviteRequest,
            dtos::account::CleanupResponse,
            models::InviteClaim,
            utils::PasswordAssessment,
            utils::PasswordStrength,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Password", description = "Password strength scoring and generation"),
        (name = "Verification", description = "Email verification links"),
        (name = "Password Reset", description = "Password reset links"),
        (name = "Two-Factor", description = "Emailed sign-in codes"),
        (name = "Invitations", description = "Invitation redemption"),
        (name = "Admin", description = "Administrative operations"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ADMIN_API_KEY_HEADER))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub service_version: String,
    pub accounts: AccountService,
    pub admin_api_key: String,
    pub allowed_origins: Vec<String>,
    /// Shared by the endpoints that send mail.
    pub auth_rate_limiter: IpRateLimiter,
    /// Guards two-factor code guessing.
    pub code_rate_limiter: IpRateLimiter,
    pub api_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/auth/admin/invites", post(handlers::admin::create_invite))
        .route(
            "/auth/admin/tokens/cleanup",
            post(handlers::admin::cleanup_tokens),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let mail_routes = Router::new()
        .route(
            "/auth/verify-email/resend",
            post(handlers::verification::resend_verification),
        )
        .route(
            "/auth/password-reset/request",
            post(handlers::password_reset::request_password_reset),
        )
        .route("/auth/2fa/send", post(handlers::two_factor::send_code))
        .layer(from_fn_with_state(
            state.auth_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let code_routes = Router::new()
        .route("/auth/2fa/verify", post(handlers::two_factor::verify_code))
        .layer(from_fn_with_state(
            state.code_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let origins: Vec<HeaderValue> = state
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/auth/password/strength",
            post(handlers::password::check_strength),
        )
        .route(
            "/auth/password/generate",
            get(handlers::password::generate_password),
        )
        .route("/auth/verify", get(handlers::verification::verify_email))
        .route(
            "/auth/password-reset/confirm",
            post(handlers::password_reset::confirm_password_reset),
        )
        .route(
            "/auth/invites/accept",
            post(handlers::invites::accept_invite),
        )
        .merge(mail_routes)
        .merge(code_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.api_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    HeaderName::from_static(ADMIN_API_KEY_HEADER),
                    HeaderName::from_static(REQUEST_ID_HEADER),
                ]),
        )
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Token store unreachable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.accounts.tokens().health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Token store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name,
        "version": state.service_version,
        "checks": {
            "token_store": "up"
        }
    })))
}
