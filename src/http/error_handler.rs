//! Global error handler.
//!
//! Last line of defence around the request pipeline: any unclassified error
//! or panic becomes a 500 envelope. The handler is the single producer of the
//! response once the pipeline has failed.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::error::GatewayError;
use crate::http::response::ErrorResponse;

pub const GENERIC_MESSAGE: &str = "Internal gateway error";

/// Drive `future` and turn every failure mode into exactly one response.
pub async fn guard<F>(path: &str, future: F) -> Response
where
    F: Future<Output = Result<Response, GatewayError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) if error.is_classified() => {
            ErrorResponse::from_error(&error, path).into_response()
        }
        Ok(Err(error)) => {
            tracing::error!(path = %path, error = %error, "Unhandled gateway error");
            internal_error_response(path, Some(&error.to_string()))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(
                path = %path,
                panic = message.unwrap_or("<non-string payload>"),
                "Request handling panicked"
            );
            internal_error_response(path, message)
        }
    }
}

/// 500 envelope, with `message` or the generic text.
pub fn internal_error_response(path: &str, message: Option<&str>) -> Response {
    let message = match message {
        Some(m) if !m.is_empty() => m,
        _ => GENERIC_MESSAGE,
    };
    ErrorResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(path.to_string()),
    )
    .into_response()
}

/// Text of a panic payload, when it carried one.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}
