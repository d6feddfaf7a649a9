//! Operational endpoints and the fallback endpoints.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, State},
    http::{Method, Uri},
    response::Response,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::{BreakerSnapshot, CircuitState};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub routes: usize,
    #[serde(rename = "circuitBreakers")]
    pub circuit_breakers: BTreeMap<String, CircuitState>,
}

/// `GET /actuator/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let circuit_breakers = state
        .pipeline
        .breakers()
        .snapshots()
        .into_iter()
        .map(|s| (s.upstream, s.state))
        .collect();

    Json(HealthStatus {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
        routes: state.pipeline.routes().len(),
        circuit_breakers,
    })
}

/// `GET /actuator/circuitbreakers`
pub async fn circuit_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.pipeline.breakers().snapshots())
}

/// `ANY /fallback/{service}` and `ANY /fallback/{service}/{*rest}`
pub async fn fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Path(params): Path<HashMap<String, String>>,
) -> Response {
    let service = params.get("service").map(String::as_str).unwrap_or_default();
    state
        .pipeline
        .fallback()
        .respond_endpoint(service, &method, uri.path())
}
