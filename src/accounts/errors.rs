use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::accounts::{dto::ErrorResponse, repo::StoreError};

/// Failures of the account lifecycle, rendered as `{ success: false, message }`.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Not allowed to modify another account")]
    Forbidden,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AccountError::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AccountError::DuplicateEmail => StatusCode::CONFLICT,
            AccountError::InvalidCredentials | AccountError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::Forbidden => StatusCode::FORBIDDEN,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AccountError::NotFound,
            StoreError::DuplicateKey => AccountError::DuplicateEmail,
            StoreError::Unavailable(e) => AccountError::Internal(e),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        if let AccountError::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
