//! HTTP client used to reach upstreams.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::resilience::timeouts::with_deadline;

/// Transport-level failure talking to an upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Sends a fully built request to an upstream.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError>;
}

/// Pooled hyper client with connect and request deadlines.
#[derive(Clone)]
pub struct HyperUpstreamClient {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperUpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }
}

#[async_trait]
impl UpstreamClient for HyperUpstreamClient {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let response = with_deadline(self.request_timeout, self.client.request(request))
            .await
            .map_err(|elapsed| UpstreamError::Timeout(elapsed.0))?
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
