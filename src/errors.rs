use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::request_id::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard JSON error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "message": "Order 550e8400-e29b-41d4-a716-446655440000 already has an outstanding driver offer",
    "request_id": "req-abc123xyz",
    "timestamp": "2026-08-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description with entity ids and state context
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error taxonomy for every core operation.
///
/// Each operation surfaces exactly one of these classifications, with
/// enough context (ids, current vs. requested state) for the caller to
/// decide whether to retry, prompt the user, or give up.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input, rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced order/driver/delivery does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entity exists but is in the wrong state for the requested operation.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Valid request that lost a race (outstanding offer, pool claim).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Authenticated actor lacks ownership or role for this entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Caller could not be resolved to an actor at all.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Verification code past its expiry.
    #[error("Code expired: {0}")]
    CodeExpired(String),

    /// Verification attempt budget for the current code is spent.
    #[error("Attempts exhausted: {0}")]
    AttemptsExhausted(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    pub fn db_message(message: impl Into<String>) -> Self {
        ServiceError::Database(DbErr::Custom(message.into()))
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PreconditionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) | Self::AttemptsExhausted(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::CodeExpired(_) => StatusCode::GONE,
            Self::Database(_) | Self::Internal(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message for HTTP responses. Internal errors return generic text to
    /// avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
