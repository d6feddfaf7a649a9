//! Upstream proxying subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request (after all stages):
//!     → dispatcher.rs (breaker permit → build request → send → record outcome)
//!     → headers.rs (hop-by-hop removal, X-Forwarded-*)
//!     → client.rs (pooled hyper client with deadlines)
//!     → upstream response, or fallback.rs on unavailability
//! ```

pub mod client;
pub mod dispatcher;
pub mod fallback;
pub mod headers;

pub use client::{HyperUpstreamClient, UpstreamClient, UpstreamError};
pub use dispatcher::UpstreamDispatcher;
pub use fallback::FallbackResponder;
