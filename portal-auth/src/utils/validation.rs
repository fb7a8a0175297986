use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::dtos::ErrorResponse;

pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Json parse error: {}", e),
            };
            (StatusCode::BAD_REQUEST, Json(err_resp)).into_response()
        })?;

        value.validate().map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Validation error: {}", e),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(err_resp)).into_response()
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Addresses are stored and namespaced in trimmed lower case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Two-factor codes are exactly six ASCII digits.
pub fn validate_two_factor_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("two_factor_code");
        err.message = Some("Code must be 6 digits".into());
        Err(err)
    }
}

/// Invite identifiers are colon-delimited, so neither part may contain one.
pub fn validate_no_colon(value: &str) -> Result<(), ValidationError> {
    if value.contains(':') {
        let mut err = ValidationError::new("no_colon");
        err.message = Some("Must not contain ':'".into());
        Err(err)
    } else {
        Ok(())
    }
}
