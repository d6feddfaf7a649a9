//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (assign request ID)
//!     → actuator.rs (health, breakers, /fallback/**) | Pipeline (everything else)
//!     → error_handler.rs (last-resort 500)
//!     → response.rs (JSON error envelope)
//!     → Send to client
//! ```

pub mod actuator;
pub mod error_handler;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdLayer, X_REQUEST_ID};
pub use response::ErrorResponse;
pub use server::{AppState, GatewayServer};
