use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diary_core::{AuthError, IdentityError, LedgerError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not logged in")]
    Unauthorized,
    #[error("invalid username or password")]
    BadCredentials,
    #[error("invalid username: {0}")]
    Identity(#[from] IdentityError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized | ApiError::BadCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Identity(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Ledger(LedgerError::MiningExhausted { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Auth(AuthError::Backend(_))
            | ApiError::Ledger(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
