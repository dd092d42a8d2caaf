// Clinic API - Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the query layer and handlers.
///
/// Store failures are logged server-side and returned as an opaque 500 so raw
/// SQL errors never reach clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("invalid value for `{field}`: {message}")]
    InvalidParameter {
        field: &'static str,
        message: String,
    },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(entity: &'static str) -> Self {
        ApiError::NotFound { entity }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::InvalidParameter {
            field,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Store(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::InvalidParameter { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_enumerate_offending_field() {
        let err = ApiError::invalid("gender", "expected one of the gender values");
        assert!(err.to_string().contains("gender"));

        let err = ApiError::not_found("patient");
        assert_eq!(err.to_string(), "patient not found");
    }

    #[test]
    fn test_store_error_response_is_opaque() {
        let err = ApiError::Store(anyhow::anyhow!("SQL syntax error near SELECT"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
