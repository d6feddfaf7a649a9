//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → error_handler::guard (panics + unclassified errors → 500)
//!     → RouteTable::match_route (no match → 404)
//!     → RequestContext (path stripped per route)
//!     → stages in order: authentication → authorization
//!     → UpstreamDispatcher (breaker permit → upstream → outcome)
//!     → upstream response | fallback 503 | error envelope
//! ```
//!
//! # Design Decisions
//! - A stage failure short-circuits everything after it
//! - Classified errors are answered here; only `Internal` reaches the guard
//! - One owned `Response` per request, so no answer can be written twice

pub mod context;
pub mod stage;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::error_handler;
use crate::http::response::ErrorResponse;
use crate::observability::metrics;
use crate::proxy::{FallbackResponder, UpstreamClient, UpstreamDispatcher};
use crate::resilience::BreakerRegistry;
use crate::routing::{Route, RouteTable, RouteTableError};
use crate::security::{AuthenticationStage, AuthorizationStage, TokenValidator};

pub use context::RequestContext;
pub use stage::{Stage, StageOutcome};

/// The assembled gateway: routes, stages, breakers, dispatch and fallback.
pub struct Pipeline {
    routes: RouteTable,
    stages: Vec<Arc<dyn Stage>>,
    breakers: Arc<BreakerRegistry>,
    dispatcher: UpstreamDispatcher,
    fallback: FallbackResponder,
}

impl Pipeline {
    pub fn new(
        routes: RouteTable,
        stages: Vec<Arc<dyn Stage>>,
        breakers: Arc<BreakerRegistry>,
        dispatcher: UpstreamDispatcher,
        fallback: FallbackResponder,
    ) -> Self {
        Self {
            routes,
            stages,
            breakers,
            dispatcher,
            fallback,
        }
    }

    /// Standard pipeline: authentication then authorization, then dispatch.
    pub fn from_config(
        config: &GatewayConfig,
        validator: Arc<dyn TokenValidator>,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, RouteTableError> {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(AuthenticationStage::new(validator, &config.security)),
            Arc::new(AuthorizationStage::new(&config.security)),
        ];

        Ok(Self::new(
            RouteTable::from_config(config)?,
            stages,
            Arc::new(BreakerRegistry::from_config(config)),
            UpstreamDispatcher::new(client),
            FallbackResponder::from_config(config),
        ))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn fallback(&self) -> &FallbackResponder {
        &self.fallback
    }

    /// Answer one request. Never fails; every error becomes a response.
    ///
    /// The request metric is recorded after the guard, so panics and
    /// unclassified errors are counted under the route that matched.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let matched = OnceLock::new();

        let response = error_handler::guard(&path, self.process(request, &matched)).await;

        let route = matched.get().map(String::as_str).unwrap_or("none");
        metrics::record_request(route, method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn process(
        &self,
        request: Request<Body>,
        matched: &OnceLock<String>,
    ) -> Result<Response, GatewayError> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(route) = self.routes.match_route(&method, &path) else {
            tracing::warn!(method = %method, path = %path, "No route matched");
            return Err(GatewayError::RouteNotFound);
        };
        let _ = matched.set(route.id.clone());

        let ctx = RequestContext::from_request(request, route.forward_path(&path));
        tracing::debug!(
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            method = %method,
            path = %path,
            route = %route.id,
            forward_path = %ctx.forward_path,
            "Route matched"
        );

        let response = match self.run(&route, ctx).await {
            Ok(response) => response,
            Err(GatewayError::UpstreamUnavailable { upstream, reason }) => {
                self.fallback.respond(&upstream, &method, &path, reason)
            }
            Err(error) if error.is_classified() => {
                ErrorResponse::from_error(&error, &path).into_response()
            }
            Err(error) => return Err(error),
        };

        Ok(response)
    }

    async fn run(&self, route: &Route, mut ctx: RequestContext) -> Result<Response, GatewayError> {
        for stage in &self.stages {
            match stage.apply(route, ctx).await? {
                StageOutcome::Continue(next) => ctx = next,
                StageOutcome::Respond(response) => {
                    tracing::debug!(stage = stage.name(), route = %route.id, "Stage answered directly");
                    return Ok(response);
                }
            }
        }

        let breaker = route
            .circuit_breaker
            .as_ref()
            .and_then(|_| self.breakers.get(&route.upstream));
        self.dispatcher.dispatch(route, ctx, breaker).await
    }
}
