//! Upstream dispatch under circuit-breaker supervision.
//!
//! # Responsibilities
//! - Build the upstream request from the route and context
//! - Consult the upstream's breaker before any network I/O
//! - Report the call outcome to the breaker before any fallback decision
//!
//! # Design Decisions
//! - Without a breaker, upstream error statuses pass through unchanged
//! - With a breaker, a failure status is answered by the fallback
//! - Dropping the in-flight call (client gone) releases a half-open trial slot

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, Uri};

use crate::error::{GatewayError, UnavailableReason};
use crate::http::X_REQUEST_ID;
use crate::pipeline::context::RequestContext;
use crate::proxy::client::UpstreamClient;
use crate::proxy::headers::{prepare_upstream_headers, stripped_prefix};
use crate::resilience::{BreakerPermit, CallOutcome, CircuitBreaker};
use crate::routing::Route;

/// Forwards admitted requests to their upstream.
#[derive(Clone)]
pub struct UpstreamDispatcher {
    client: Arc<dyn UpstreamClient>,
}

impl UpstreamDispatcher {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }

    /// Forward the request, supervised by `breaker` when the route has one.
    ///
    /// Returns [`GatewayError::UpstreamUnavailable`] when the breaker rejects
    /// the call or the call fails; the caller turns that into a fallback.
    pub async fn dispatch(
        &self,
        route: &Route,
        ctx: RequestContext,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Result<Response<Body>, GatewayError> {
        let permit = match &breaker {
            Some(breaker) => match breaker.permit() {
                Ok(permit) => Some(permit),
                Err(rejected) => {
                    tracing::debug!(
                        upstream = %rejected.upstream,
                        state = rejected.state.as_str(),
                        path = %ctx.original_path,
                        "Call rejected by circuit breaker"
                    );
                    return Err(unavailable(route, UnavailableReason::BreakerOpen));
                }
            },
            None => None,
        };

        let request_id = ctx.request_id.clone();
        let request = build_upstream_request(route, ctx)?;
        let target = request.uri().clone();

        match self.client.send(request).await {
            Ok(response) => {
                let status = response.status();
                let outcome = match &breaker {
                    Some(breaker) => breaker.classify_status(status),
                    None => CallOutcome::Success,
                };
                settle(permit, outcome);

                if outcome == CallOutcome::Failure {
                    tracing::warn!(
                        request_id = request_id.as_deref().unwrap_or("-"),
                        upstream = %route.upstream,
                        target = %target,
                        status = status.as_u16(),
                        "Upstream answered with a failure status"
                    );
                    return Err(unavailable(route, UnavailableReason::DispatchFailure));
                }

                tracing::debug!(
                    request_id = request_id.as_deref().unwrap_or("-"),
                    upstream = %route.upstream,
                    target = %target,
                    status = status.as_u16(),
                    "Upstream responded"
                );
                Ok(response)
            }
            Err(e) => {
                settle(permit, CallOutcome::Failure);
                tracing::warn!(
                    request_id = request_id.as_deref().unwrap_or("-"),
                    upstream = %route.upstream,
                    target = %target,
                    error = %e,
                    "Upstream call failed"
                );
                Err(unavailable(route, UnavailableReason::DispatchFailure))
            }
        }
    }
}

fn settle(permit: Option<BreakerPermit>, outcome: CallOutcome) {
    if let Some(permit) = permit {
        permit.record(outcome);
    }
}

fn unavailable(route: &Route, reason: UnavailableReason) -> GatewayError {
    GatewayError::UpstreamUnavailable {
        upstream: route.upstream.clone(),
        reason,
    }
}

/// Absolute upstream URI: the upstream base URL joined with the forwarded path and query.
pub fn upstream_uri(route: &Route, ctx: &RequestContext) -> Result<Uri, GatewayError> {
    let base = route.upstream_url.as_str().trim_end_matches('/');
    let target = format!("{base}{}", ctx.forward_path_and_query());
    target.parse::<Uri>().map_err(|e| {
        GatewayError::internal(format!(
            "invalid upstream URI '{target}' for route '{}': {e}",
            route.id
        ))
    })
}

/// Turn the context into the request sent upstream.
pub fn build_upstream_request(
    route: &Route,
    ctx: RequestContext,
) -> Result<Request<Body>, GatewayError> {
    let uri = upstream_uri(route, &ctx)?;
    let prefix = stripped_prefix(&ctx.original_path, &ctx.forward_path).to_string();

    let RequestContext {
        method,
        mut headers,
        body,
        request_id,
        client_addr,
        ..
    } = ctx;

    prepare_upstream_headers(&mut headers, client_addr, &prefix);
    if let Some(id) = request_id.as_deref() {
        if !headers.contains_key(&X_REQUEST_ID) {
            if let Ok(value) = id.parse() {
                headers.insert(X_REQUEST_ID, value);
            }
        }
    }

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .map_err(|e| GatewayError::internal(format!("failed to build upstream request: {e}")))?;
    *request.headers_mut() = headers;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerPolicy;
    use crate::pipeline::testing::{context, route, MockUpstream};
    use crate::resilience::CircuitState;
    use axum::http::StatusCode;

    fn breaker() -> Arc<CircuitBreaker> {
        let policy = BreakerPolicy {
            failure_threshold: 2,
            ..BreakerPolicy::default()
        };
        Arc::new(CircuitBreaker::new("student-service", policy))
    }

    #[test]
    fn test_upstream_uri_joins_base_and_forward_path() {
        let mut route = route("/api/students/**", &[]);
        route.upstream_url = "http://students.internal:8082/".parse().unwrap();
        let ctx = context("/api/students/5?expand=true", &[]);

        let uri = upstream_uri(&route, &ctx).unwrap();
        assert_eq!(uri.to_string(), "http://students.internal:8082/students/5?expand=true");
    }

    #[test]
    fn test_build_request_sets_forwarding_headers() {
        let route = route("/api/students/**", &[]);
        let ctx = context(
            "/api/students/5",
            &[("host", "gateway.local"), ("connection", "keep-alive"), ("x-user-id", "alice")],
        );

        let request = build_upstream_request(&route, ctx).unwrap();
        let headers = request.headers();
        assert!(headers.get("host").is_none());
        assert!(headers.get("connection").is_none());
        assert_eq!(headers["x-forwarded-prefix"], "/api");
        assert_eq!(headers["x-forwarded-host"], "gateway.local");
        assert_eq!(headers["x-user-id"], "alice");
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let upstream = Arc::new(MockUpstream::with_statuses(&[StatusCode::CREATED]));
        let dispatcher = UpstreamDispatcher::new(upstream.clone());

        let response = dispatcher
            .dispatch(&route("/api/students/**", &[]), context("/api/students", &[]), Some(breaker()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(upstream.calls(), 1);
        assert_eq!(upstream.recorded()[0].uri, "http://127.0.0.1:1/students");
    }

    #[tokio::test]
    async fn test_client_error_passes_through_and_counts_as_success() {
        let upstream = Arc::new(MockUpstream::with_statuses(&[StatusCode::NOT_FOUND; 3]));
        let dispatcher = UpstreamDispatcher::new(upstream);
        let breaker = breaker();

        for _ in 0..3 {
            let response = dispatcher
                .dispatch(&route("/api/students/**", &[]), context("/api/students/9", &[]), Some(breaker.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failures_open_breaker_then_short_circuit() {
        let upstream = Arc::new(MockUpstream::with_statuses(&[StatusCode::INTERNAL_SERVER_ERROR; 2]));
        let dispatcher = UpstreamDispatcher::new(upstream.clone());
        let breaker = breaker();
        let route = route("/api/students/**", &[]);

        for _ in 0..2 {
            let err = dispatcher
                .dispatch(&route, context("/api/students", &[]), Some(breaker.clone()))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                GatewayError::UpstreamUnavailable { reason: UnavailableReason::DispatchFailure, .. }
            ));
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = dispatcher
            .dispatch(&route, context("/api/students", &[]), Some(breaker.clone()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::UpstreamUnavailable { reason: UnavailableReason::BreakerOpen, .. }
        ));
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_without_breaker_error_status_passes_through() {
        let upstream = Arc::new(MockUpstream::with_statuses(&[StatusCode::BAD_GATEWAY]));
        let dispatcher = UpstreamDispatcher::new(upstream);

        let response = dispatcher
            .dispatch(&route("/api/courses/**", &[]), context("/api/courses", &[]), None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_without_breaker_transport_failure_is_unavailable() {
        let upstream = Arc::new(MockUpstream::failing());
        let dispatcher = UpstreamDispatcher::new(upstream);

        let err = dispatcher
            .dispatch(&route("/api/courses/**", &[]), context("/api/courses", &[]), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
