//! Gateway error taxonomy.
//!
//! Every stage classifies its own failures into one of these variants. The
//! pipeline turns classified errors into the JSON error envelope; only
//! [`GatewayError::Internal`] escapes to the global error handler.

use axum::http::StatusCode;
use thiserror::Error;

/// Reasons the authentication stage rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    MalformedScheme,

    #[error("Token expired or invalid")]
    InvalidToken,

    #[error("Authentication failed")]
    ValidatorFailure,
}

/// Reasons the authorization stage rejects a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// No role claim reached the stage. The status is a configuration choice.
    #[error("Missing user roles")]
    MissingRolesHeader { status: StatusCode },

    #[error("Access denied")]
    InsufficientRoles,
}

/// Why an upstream was treated as unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The breaker rejected the call without contacting the upstream.
    BreakerOpen,
    /// The call was attempted and failed (transport error or failure status).
    DispatchFailure,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::BreakerOpen => "breaker_open",
            UnavailableReason::DispatchFailure => "dispatch_failure",
        }
    }
}

/// Umbrella error for the request pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Upstream '{upstream}' unavailable ({})", reason.as_str())]
    UpstreamUnavailable {
        upstream: String,
        reason: UnavailableReason,
    },

    #[error("No route matches the request")]
    RouteNotFound,

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal(message.into())
    }

    /// HTTP status presented to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Authorization(AuthorizationError::MissingRolesHeader { status }) => *status,
            GatewayError::Authorization(AuthorizationError::InsufficientRoles) => StatusCode::FORBIDDEN,
            GatewayError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when a stage owns this error and answers it directly.
    pub fn is_classified(&self) -> bool {
        !matches!(self, GatewayError::Internal(_))
    }
}
