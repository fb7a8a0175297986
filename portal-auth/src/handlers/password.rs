use axum::{extract::Query, response::IntoResponse, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::account::{
    GeneratePasswordQuery, GeneratedPasswordResponse, PasswordStrengthRequest,
};
use crate::utils::password::{
    check_password_strength, generate_random_password, PasswordAssessment,
    DEFAULT_GENERATED_LENGTH,
};

/// Score a candidate password
#[utoipa::path(
    post,
    path = "/auth/password/strength",
    request_body = PasswordStrengthRequest,
    responses(
        (status = 200, description = "Assessment of the password", body = PasswordAssessment),
        (status = 400, description = "Malformed body", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn check_strength(Json(req): Json<PasswordStrengthRequest>) -> Json<PasswordAssessment> {
    Json(check_password_strength(&req.password))
}

/// Generate a random password containing every character class
#[utoipa::path(
    get,
    path = "/auth/password/generate",
    params(GeneratePasswordQuery),
    responses(
        (status = 200, description = "Generated password", body = GeneratedPasswordResponse),
        (status = 422, description = "Length out of range", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn generate_password(
    Query(query): Query<GeneratePasswordQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let password = generate_random_password(query.length.unwrap_or(DEFAULT_GENERATED_LENGTH));
    let assessment = check_password_strength(&password);

    Ok(Json(GeneratedPasswordResponse {
        password,
        assessment,
    }))
}
