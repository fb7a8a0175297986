use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{dtos::account::AcceptInviteRequest, models::InviteClaim, utils::ValidatedJson, AppState};

/// Redeem an invitation
#[utoipa::path(
    post,
    path = "/auth/invites/accept",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Invitation accepted", body = InviteClaim),
        (status = 400, description = "Invalid or expired invitation", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Invitations"
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<AcceptInviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claim = state.accounts.accept_invite(&req.token).await?;
    Ok(Json(claim))
}
