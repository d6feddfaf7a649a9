//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a method and path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Literal patterns are checked before wildcard patterns
//! - Within a tier, registration order wins
//! - O(n) scan (acceptable for typical route counts)

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::GatewayConfig;
use crate::routing::matcher::{strip_segments, MethodMatcher, PathPattern};

/// Error raised while compiling the route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },

    #[error("upstream '{upstream}' has an invalid URL: {source}")]
    InvalidUrl {
        upstream: String,
        #[source]
        source: url::ParseError,
    },

    #[error("route '{route}' has an invalid method '{method}'")]
    InvalidMethod { route: String, method: String },
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub pattern: PathPattern,
    pub methods: MethodMatcher,
    pub strip_prefix: usize,
    pub upstream: String,
    pub upstream_url: Url,
    pub authenticate: bool,
    pub required_roles: BTreeSet<String>,
    pub circuit_breaker: Option<String>,
}

impl Route {
    /// True if this route places no role restriction on callers.
    pub fn is_unrestricted(&self) -> bool {
        self.required_roles.is_empty()
    }

    /// The path forwarded upstream for an inbound path.
    pub fn forward_path(&self, path: &str) -> String {
        strip_segments(path, self.strip_prefix)
    }
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile the configured routes.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RouteTableError> {
        let mut routes = Vec::with_capacity(config.routes.len());

        for route in &config.routes {
            let upstream = config.upstream(&route.upstream).ok_or_else(|| {
                RouteTableError::UnknownUpstream {
                    route: route.id.clone(),
                    upstream: route.upstream.clone(),
                }
            })?;
            let upstream_url =
                Url::parse(&upstream.url).map_err(|source| RouteTableError::InvalidUrl {
                    upstream: upstream.name.clone(),
                    source,
                })?;

            let methods = route
                .methods
                .iter()
                .map(|m| {
                    m.to_uppercase()
                        .parse::<Method>()
                        .map_err(|_| RouteTableError::InvalidMethod {
                            route: route.id.clone(),
                            method: m.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            routes.push(Arc::new(Route {
                id: route.id.clone(),
                pattern: PathPattern::parse(&route.path),
                methods: MethodMatcher::new(methods),
                strip_prefix: route.strip_prefix,
                upstream: route.upstream.clone(),
                upstream_url,
                authenticate: route.authenticate,
                required_roles: route.required_roles.iter().cloned().collect(),
                circuit_breaker: route.circuit_breaker.clone(),
            }));
        }

        // Stable sort keeps registration order within each tier.
        routes.sort_by_key(|r| r.pattern.specificity());

        tracing::info!(routes = routes.len(), "Route table compiled");
        Ok(Self { routes })
    }

    /// Find the route for a request.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<Arc<Route>> {
        self.routes
            .iter()
            .find(|r| r.methods.matches(method) && r.pattern.matches(path))
            .cloned()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
