//! Degraded answers for unavailable upstreams.

use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::config::GatewayConfig;
use crate::error::UnavailableReason;
use crate::http::response::ErrorResponse;
use crate::observability::metrics;

/// Builds the 503 envelope served when an upstream cannot be reached.
#[derive(Debug, Clone, Default)]
pub struct FallbackResponder {
    messages: HashMap<String, String>,
}

impl FallbackResponder {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let messages = config
            .upstreams
            .iter()
            .filter_map(|u| {
                u.fallback_message
                    .as_ref()
                    .map(|message| (u.name.clone(), message.clone()))
            })
            .collect();
        Self { messages }
    }

    /// Configured upstream name and message for a service name or alias.
    ///
    /// `auth` and `students` style aliases resolve to `auth-service` and
    /// `student-service`.
    fn resolve(&self, service: &str) -> Option<(&str, &str)> {
        let candidates = [
            service.to_string(),
            format!("{service}-service"),
            format!("{}-service", service.strip_suffix('s').unwrap_or(service)),
        ];
        candidates.iter().find_map(|name| {
            self.messages
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
    }

    /// Configured message for a service name, or the generic one.
    pub fn message_for(&self, service: &str) -> String {
        self.resolve(service)
            .map(|(_, message)| message.to_string())
            .unwrap_or_else(|| generic_message(service))
    }

    /// Answer for `upstream` being unavailable. Logs and counts the event.
    pub fn respond(
        &self,
        upstream: &str,
        method: &Method,
        path: &str,
        reason: UnavailableReason,
    ) -> Response {
        metrics::record_fallback(upstream, reason.as_str());
        self.envelope(upstream, method, path, reason.as_str())
    }

    /// Answer for a direct hit on a `/fallback/{service}` endpoint.
    pub fn respond_endpoint(&self, service: &str, method: &Method, path: &str) -> Response {
        let label = self.resolve(service).map(|(name, _)| name).unwrap_or("unknown");
        metrics::record_fallback(label, "endpoint");
        self.envelope(service, method, path, "endpoint")
    }

    fn envelope(&self, service: &str, method: &Method, path: &str, reason: &str) -> Response {
        let timestamp = Utc::now();
        tracing::warn!(
            service = %service,
            method = %method,
            path = %path,
            reason,
            timestamp = %timestamp.to_rfc3339(),
            "Serving fallback response"
        );

        ErrorResponse::at(
            timestamp,
            StatusCode::SERVICE_UNAVAILABLE,
            self.message_for(service),
            None,
        )
        .into_response()
    }
}

fn generic_message(service: &str) -> String {
    let service = service.strip_suffix("-service").unwrap_or(service);
    format!("The {service} service is temporarily unavailable. Please try again later.")
}
