//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after route match):
//!     → authentication.rs (public path? bearer token → TokenValidator → identity headers)
//!     → authorization.rs (X-User-Roles ∩ required roles)
//!     → Pass to dispatch
//!
//! Around the whole server:
//!     → cors.rs (preflight + response headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client-supplied identity headers

pub mod authentication;
pub mod authorization;
pub mod cors;
pub mod token;

pub use authentication::AuthenticationStage;
pub use authorization::AuthorizationStage;
pub use token::{JwtValidator, TokenClaims, TokenError, TokenValidator};
