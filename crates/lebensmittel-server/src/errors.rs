//! HTTP error responses.
//!
//! Every failure leaves the server as `{"error": "<message>"}` with the
//! matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lebensmittel_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A request-level failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400: malformed input or no usable group.
    #[error("{0}")]
    BadRequest(String),
    /// 401: missing or rejected credential.
    #[error("{0}")]
    Unauthorized(String),
    /// 403: caller is not a member of the requested group.
    #[error("{0}")]
    Forbidden(String),
    /// 404: no such record in the active group.
    #[error("{0}")]
    NotFound(String),
    /// 500: store or internal failure. The detail is logged, not returned.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for [`ApiError::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Shorthand for [`ApiError::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(detail) => {
                error!(%detail, "request failed");
                "Internal server error".to_owned()
            }
            Self::BadRequest(m) | Self::Unauthorized(m) | Self::Forbidden(m) | Self::NotFound(m) => {
                m
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, .. } => Self::NotFound(format!("{} not found", capitalize(kind))),
            StoreError::InvalidInput(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
