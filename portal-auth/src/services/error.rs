use service_core::error::AppError;
use thiserror::Error;

/// Message shown for every failed token or code check. Wrong, expired and
/// never-issued secrets must be indistinguishable to the caller.
pub const INVALID_OR_EXPIRED: &str = "Invalid or expired link or code";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Email already verified")]
    EmailAlreadyVerified,

    #[error("Password does not meet requirements: {}", .0.join(", "))]
    WeakPassword(Vec<String>),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidOrExpiredToken => {
                AppError::BadRequest(anyhow::anyhow!(INVALID_OR_EXPIRED))
            }
            ServiceError::InvalidCode => AppError::Unauthorized(anyhow::anyhow!(INVALID_OR_EXPIRED)),
            ServiceError::EmailAlreadyVerified => AppError::Conflict(anyhow::anyhow!(
                "This email is already verified. You can login directly."
            )),
            ServiceError::WeakPassword(feedback) => AppError::BadRequest(anyhow::anyhow!(
                "Password does not meet requirements: {}",
                feedback.join(", ")
            )),
            ServiceError::Email(e) => AppError::EmailError(e),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
