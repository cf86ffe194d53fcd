use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cutie_store::StoreError;
use thiserror::Error;

use crate::discord::PlatformError;

/// Errors raised by the command surface.
///
/// The dispatcher is the only place that catches these; it logs the detail
/// and answers the user with a generic error card.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Caller is not allowed to run this command")]
    Unauthorized,

    #[error("Ledger error: {0}")]
    Storage(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced as HTTP responses by the interactions endpoint.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request signature")]
    InvalidSignature,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidSignature => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
