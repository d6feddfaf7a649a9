//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate method + path pattern)
//!     → Return: matched Route or NoMatch (404)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Resolve upstream URLs
//!     → Sort literal patterns ahead of wildcards (stable)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{strip_segments, PathPattern};
pub use router::{Route, RouteTable, RouteTableError};
