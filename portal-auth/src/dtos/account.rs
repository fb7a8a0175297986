use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::utils::password::PasswordAssessment;
use crate::utils::validation::{validate_no_colon, validate_two_factor_code};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordStrengthRequest {
    #[schema(example = "Tr0ub4dor&3XyZ")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeneratePasswordQuery {
    #[validate(range(min = 8, max = 100, message = "Length must be between 8 and 100"))]
    #[param(example = 16)]
    pub length: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedPasswordResponse {
    #[schema(example = "k#8Vq!2mZr@1xPb7")]
    pub password: String,
    pub assessment: PasswordAssessment,
}

/// Body for endpoints that only need an address.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    #[schema(example = "member@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    #[validate(length(min = 1, message = "Verification token is required"))]
    #[param(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Reset token is required"))]
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub token: String,

    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must be between 8 and 100 characters"
    ))]
    #[schema(example = "Tr0ub4dor&3XyZ", min_length = 8)]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    #[schema(example = "Tr0ub4dor&3XyZ")]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TwoFactorVerifyRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    #[schema(example = "member@example.com")]
    pub email: String,

    #[validate(custom(function = "validate_two_factor_code"))]
    #[schema(example = "493027")]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFactorVerifyResponse {
    #[schema(example = true)]
    pub verified: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInviteRequest {
    #[validate(
        email(message = "Please enter a valid email address"),
        custom(function = "validate_no_colon")
    )]
    #[schema(example = "new.member@example.com")]
    pub email: String,

    #[validate(
        length(min = 1, max = 128, message = "Inviter id is required"),
        custom(function = "validate_no_colon")
    )]
    #[schema(example = "3f0e2a4c-8d57-4bb4-9d38-1f2a6c9d0e11")]
    pub invited_by: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInviteResponse {
    #[schema(example = "new.member@example.com")]
    pub email: String,
    #[schema(example = "3f0e2a4c-8d57-4bb4-9d38-1f2a6c9d0e11")]
    pub invited_by: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1, message = "Invite token is required"))]
    #[schema(example = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae")]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    #[schema(example = 12)]
    pub deleted: u64,
}
