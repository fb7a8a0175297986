use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        account::{EmailRequest, TwoFactorVerifyRequest, TwoFactorVerifyResponse},
        MessageResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Email a six-digit sign-in code
#[utoipa::path(
    post,
    path = "/auth/2fa/send",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Request received", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Two-Factor"
)]
pub async fn send_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.send_two_factor_code(&req.email).await?;

    Ok(Json(MessageResponse::new(
        "If your email is registered, you will receive a sign-in code shortly.",
    )))
}

/// Check a six-digit sign-in code
#[utoipa::path(
    post,
    path = "/auth/2fa/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Code accepted", body = TwoFactorVerifyResponse),
        (status = 401, description = "Invalid or expired code", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Two-Factor"
)]
pub async fn verify_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<TwoFactorVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .verify_two_factor_code(&req.email, &req.code)
        .await?;

    Ok(Json(TwoFactorVerifyResponse { verified: true }))
}
