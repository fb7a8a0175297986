use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        account::{EmailRequest, PasswordResetConfirm},
        MessageResponse,
    },
    utils::{Password, ValidatedJson},
    AppState,
};

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Request received", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password Reset"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .request_password_reset(&req.email)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to process password reset request");
            e
        })?;

    Ok(Json(MessageResponse::new(
        "If your email is registered, you will receive a password reset link shortly.",
    )))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password reset successful", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Password Reset"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    let password = Password::new(req.password);
    let confirm_password = Password::new(req.confirm_password);

    state
        .accounts
        .confirm_password_reset(&req.token, &password, &confirm_password)
        .await?;

    Ok(Json(MessageResponse::new(
        "Password reset successful. You can now login with your new password.",
    )))
}
