use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::account::{CleanupResponse, CreateInviteRequest, CreateInviteResponse},
    utils::{normalize_email, ValidatedJson},
    AppState,
};

/// Issue and email an invitation
#[utoipa::path(
    post,
    path = "/auth/admin/invites",
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invitation sent", body = CreateInviteResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn create_invite(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateInviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state
        .accounts
        .create_invite(&req.email, &req.invited_by)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            email: normalize_email(&req.email),
            invited_by: req.invited_by.trim().to_string(),
            expires: issued.expires,
        }),
    ))
}

/// Remove expired verification records now
#[utoipa::path(
    post,
    path = "/auth/admin/tokens/cleanup",
    responses(
        (status = 200, description = "Expired records removed", body = CleanupResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn cleanup_tokens(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let deleted = state.accounts.cleanup_expired_tokens().await?;
    Ok(Json(CleanupResponse { deleted }))
}
