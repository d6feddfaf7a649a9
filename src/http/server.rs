//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: actuator, fallback endpoints, gateway catch-all
//! - Wire up middleware (request ID, tracing, CORS)
//! - Bind to a listener and serve until shutdown
//!
//! # Design Decisions
//! - Everything not served locally goes through the [`Pipeline`]
//! - Connection info is attached so forwarded requests carry X-Forwarded-For

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::actuator;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::pipeline::Pipeline;
use crate::proxy::{HyperUpstreamClient, UpstreamClient};
use crate::routing::RouteTableError;
use crate::security::cors::cors_layer;
use crate::security::TokenValidator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    pipeline: Arc<Pipeline>,
}

impl GatewayServer {
    /// Create a server that reaches upstreams over the pooled hyper client.
    pub fn new(
        config: GatewayConfig,
        validator: Arc<dyn TokenValidator>,
    ) -> Result<Self, RouteTableError> {
        let client = Arc::new(HyperUpstreamClient::new(&config.timeouts));
        Self::with_client(config, validator, client)
    }

    /// Create a server with an explicit upstream client.
    pub fn with_client(
        config: GatewayConfig,
        validator: Arc<dyn TokenValidator>,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, RouteTableError> {
        let pipeline = Arc::new(Pipeline::from_config(&config, validator, client)?);
        let router = Self::build_router(
            &config,
            AppState {
                pipeline: pipeline.clone(),
            },
        );

        Ok(Self {
            router,
            config,
            pipeline,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/actuator/health", get(actuator::health))
            .route("/actuator/circuitbreakers", get(actuator::circuit_breakers))
            .route("/fallback/{service}", any(actuator::fallback))
            .route("/fallback/{service}/{*rest}", any(actuator::fallback))
            .fallback(gateway_handler)
            .with_state(state);

        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors));
        }

        router
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(&X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(RequestIdLayer)
    }

    /// Router with all layers, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.pipeline.routes().len(),
            breakers = self.pipeline.breakers().len(),
            "Gateway server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Catch-all: every request not served locally goes through the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.pipeline.handle(request).await
}
