use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{
        account::{EmailRequest, VerifyEmailQuery},
        MessageResponse,
    },
    services::EmailVerificationOutcome,
    utils::ValidatedJson,
    AppState,
};

/// Send a fresh verification link
#[utoipa::path(
    post,
    path = "/auth/verify-email/resend",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Request received", body = MessageResponse),
        (status = 409, description = "Email already verified", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .accounts
        .resend_verification_email(&req.email)
        .await?;

    Ok(Json(MessageResponse::new(
        "If your email is registered, you will receive a verification link shortly.",
    )))
}

/// Consume an email verification link
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired link", body = ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let message = match state.accounts.verify_email(&query.token).await? {
        EmailVerificationOutcome::Verified => {
            "Email verified successfully! You can now login to your account."
        }
        EmailVerificationOutcome::AlreadyVerified => {
            "This email is already verified. You can login directly."
        }
    };

    Ok(Json(MessageResponse::new(message)))
}
