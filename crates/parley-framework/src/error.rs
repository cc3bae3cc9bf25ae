//! Error types for the Parley framework.

use thiserror::Error;

/// Returned by an activity filter when an activity does **not** match.
///
/// Hosts recognise this error and skip the turn without logging it. All
/// other errors are genuine failures.
#[derive(Debug, Clone, Error)]
#[error("activity skipped by filter")]
pub struct ActivitySkipped;

/// Errors raised while constructing built-in middleware.
#[derive(Debug, Clone, Error)]
pub enum FrameworkError {
    /// The typing indicator repeat period must be non-zero.
    #[error("typing repeat period must be greater than zero")]
    ZeroTypingPeriod,
}

/// Result type for framework construction.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
