//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → registry.rs (breaker for the upstream, if the route has a policy)
//!     → circuit_breaker.rs (permit: allowed | rejected)
//!     → timeouts.rs (enforce the upstream deadline)
//!     → circuit_breaker.rs (record success | failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries; only the breaker's half-open probing re-tries an upstream
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerPermit, BreakerRejected, BreakerSnapshot, CallOutcome, CircuitBreaker, CircuitState,
};
pub use registry::BreakerRegistry;
