//! # Parley Framework
//!
//! Ready-made building blocks on top of the Parley turn runtime:
//!
//! - [`ActivityHandler`]: per-activity-type bot methods, run as a bot
//!   through [`ActivityBot`]
//! - [`ShowTypingMiddleware`]: typing indicators while a turn runs
//! - [`TranscriptLoggerMiddleware`]: conversation transcripts, with the
//!   in-memory [`MemoryTranscriptStore`]
//! - [`BotService`]: a tower [`Service`](tower::Service) running one turn
//!   per request, plus filter stacks in [`routing`]
//!
//! None of these are required to run a bot; the core runtime works
//! without them.

pub mod error;
pub mod handler;
pub mod routing;
pub mod service;
pub mod transcript;
pub mod typing;

// Needed to implement `ActivityHandler` and `TranscriptLogger`.
pub use async_trait::async_trait;
pub use error::{ActivitySkipped, FrameworkError, FrameworkResult};
pub use handler::{ActivityBot, ActivityHandler, dispatch_activity};
pub use routing::{FilterServiceBuilder, on_activity_type, on_event, on_message};
pub use service::{ActivityPredicate, BotService, ServiceBuilderExt, TurnOutcome};
pub use transcript::{
    MemoryTranscriptStore, PagedResult, TracingTranscriptLogger, TranscriptInfo,
    TranscriptLogger, TranscriptLoggerMiddleware, TranscriptStore,
};
pub use typing::ShowTypingMiddleware;
