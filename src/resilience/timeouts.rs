//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel the wrapped future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A timed-out call counts as a transport failure for the breaker

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline elapsed before the future completed.
#[derive(Debug, Clone, Copy, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Run `future` with a deadline. The future is dropped when the deadline passes.
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, DeadlineElapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| DeadlineElapsed(deadline))
}
