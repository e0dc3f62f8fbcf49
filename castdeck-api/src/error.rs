//! HTTP error mapping
//!
//! Every handler returns [`Result`]; failures become a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`. Store and configuration
//! failures are logged and reported with a generic message.

use axum::{
    extract::rejection::{BytesRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use libcastdeck::error::PublishError;
use libcastdeck::CastdeckError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] CastdeckError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Service(CastdeckError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Service(CastdeckError::InvalidArgument(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg)
            }
            ApiError::Service(CastdeckError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg)
            }
            // The caller supplied bad credentials or content
            ApiError::Service(CastdeckError::Publish(
                e @ (PublishError::Authentication(_) | PublishError::Validation(_)),
            )) => (StatusCode::BAD_REQUEST, "PUBLISH_REJECTED", e.to_string()),
            ApiError::Service(CastdeckError::Publish(e)) => {
                tracing::warn!("Platform error: {}", e);
                (StatusCode::BAD_GATEWAY, "PLATFORM_ERROR", e.to_string())
            }
            ApiError::Service(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
