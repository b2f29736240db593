//! API error types with IntoResponse
//!
//! Domain errors raised by handlers travel back as a structured JSON
//! payload with status 200; binding failures are client errors; database
//! failures are logged and hidden behind a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_orm::OrmError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::binder::BindingRejected;

/// Business error raised by a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainError {
    /// Machine-readable code, e.g. `value:invalid`
    pub error: String,
    /// Usually the offending field
    pub data: String,
    pub message: String,
}

impl DomainError {
    pub fn new(error: impl Into<String>, data: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            data: data.into(),
            message: message.into(),
        }
    }

    /// Input value is missing or malformed
    pub fn value_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:invalid", field, message)
    }

    /// Referenced resource does not exist
    pub fn not_found(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:notfound", field, message)
    }

    /// Caller is not allowed to do this
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new("permission:forbidden", "permission", message)
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.error, self.data, self.message)
    }
}

impl std::error::Error for DomainError {}

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Handler business error (200, structured payload)
    Domain(DomainError),

    /// Request could not be bound to the handler (400)
    Binding(BindingRejected),

    /// Pool exhausted (503)
    Unavailable(OrmError),

    /// Database error (500, logged)
    Database(OrmError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Domain(e) => (
                StatusCode::OK,
                json!({
                    "error": e.error,
                    "data": e.data,
                    "message": e.message
                }),
            ),
            Self::Binding(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "binding_rejected",
                    "message": e.to_string()
                }),
            ),
            Self::Unavailable(e) => {
                tracing::warn!("Database unavailable: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "unavailable",
                        "message": "database is busy, retry later"
                    }),
                )
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self::Domain(e)
    }
}

impl From<BindingRejected> for ApiError {
    fn from(e: BindingRejected) -> Self {
        Self::Binding(e)
    }
}

impl From<OrmError> for ApiError {
    fn from(e: OrmError) -> Self {
        match e {
            OrmError::InvalidArgument { argument, reason } => {
                Self::Domain(DomainError::value_invalid(argument, reason))
            }
            e if e.is_retryable() => Self::Unavailable(e),
            e => Self::Database(e),
        }
    }
}
