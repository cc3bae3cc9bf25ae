//! Unified error type for the Parley turn runtime.
//!
//! Every fallible operation in the pipeline returns [`BotResult`]. Contract
//! violations fail at the point where they happen; errors raised by
//! middleware, interceptors, bot logic or adapter I/O travel up the chain
//! untouched until the adapter's error boundary sees them.

use thiserror::Error;

/// Errors raised while processing a turn.
#[derive(Debug, Error)]
pub enum BotError {
    /// A caller broke an API contract (missing activity, empty batch, ...).
    #[error("contract violation: {0}")]
    Contract(String),

    /// Turn state keys must be non-empty.
    #[error("invalid turn state key: {0:?}")]
    InvalidKey(String),

    /// The requested turn state key was never set.
    #[error("turn state key '{0}' not found")]
    KeyNotFound(String),

    /// The turn state value exists but holds another type.
    #[error("turn state key '{key}' does not hold a value of type '{expected}'")]
    TypeMismatch {
        /// The key that was read.
        key: String,
        /// Name of the type the caller asked for.
        expected: &'static str,
    },

    /// `responded` only ever moves from `false` to `true`.
    #[error("cannot reset `responded` to false once the turn has responded")]
    RespondedReset,

    /// The channel rejected or failed an outbound operation.
    #[error("channel error: {0}")]
    Channel(String),

    /// A transcript logger or store failed.
    #[error("transcript error: {0}")]
    Transcript(String),

    /// Any other failure raised by bot code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BotError {
    /// Creates a contract violation error.
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    /// Creates a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Creates a transcript error.
    pub fn transcript(msg: impl Into<String>) -> Self {
        Self::Transcript(msg.into())
    }

    /// Wraps an arbitrary message as [`BotError::Other`].
    pub fn msg(msg: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Other(anyhow::Error::msg(msg))
    }

    /// Returns `true` for contract violations and turn state misuse.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::Contract(_)
                | Self::InvalidKey(_)
                | Self::KeyNotFound(_)
                | Self::TypeMismatch { .. }
                | Self::RespondedReset
        )
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.into())
    }
}

/// Result type for turn processing.
pub type BotResult<T> = Result<T, BotError>;
