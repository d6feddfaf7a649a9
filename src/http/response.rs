//! JSON error envelope returned by the gateway itself.
//!
//! Every answer the gateway produces on its own (rejections, fallbacks,
//! unhandled errors) uses this shape:
//!
//! ```json
//! {"timestamp": "2024-05-01T12:00:00Z", "status": 401, "error": "Unauthorized",
//!  "message": "Missing authorization header", "path": "/api/students"}
//! ```
//!
//! `path` is omitted from fallback envelopes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GatewayError;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>, path: Option<String>) -> Self {
        Self::at(Utc::now(), status, message, path)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        status: StatusCode,
        message: impl Into<String>,
        path: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            path,
        }
    }

    /// Envelope for a classified pipeline error.
    pub fn from_error(error: &GatewayError, path: &str) -> Self {
        Self::new(error.status(), error.to_string(), Some(path.to_string()))
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
