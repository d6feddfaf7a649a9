//! Breaker registry: one circuit breaker per upstream name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// Fixed set of breakers built at startup. Lookups need no locking.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create a breaker for every upstream guarded by at least one route.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut breakers = HashMap::new();

        for route in &config.routes {
            let Some(policy_name) = &route.circuit_breaker else {
                continue;
            };
            let Some(policy) = config.circuit_breakers.get(policy_name) else {
                tracing::warn!(route = %route.id, policy = %policy_name, "Unknown circuit breaker policy");
                continue;
            };

            breakers.entry(route.upstream.clone()).or_insert_with(|| {
                tracing::info!(
                    upstream = %route.upstream,
                    policy = %policy_name,
                    threshold = policy.failure_threshold,
                    "Circuit breaker registered"
                );
                Arc::new(CircuitBreaker::new(route.upstream.clone(), policy.clone()))
            });
        }

        Self { breakers }
    }

    pub fn get(&self, upstream: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(upstream).cloned()
    }

    /// Snapshots of all breakers, sorted by upstream name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.upstream.cmp(&b.upstream));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
