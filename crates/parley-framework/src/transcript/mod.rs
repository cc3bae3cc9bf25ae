//! Conversation transcripts.
//!
//! [`TranscriptLoggerMiddleware`] records every activity of a turn and
//! hands them to a [`TranscriptLogger`]. A [`TranscriptStore`] can also read
//! transcripts back; [`MemoryTranscriptStore`] is the in-process one.

pub mod logger;
pub mod memory;
pub mod middleware;

pub use logger::{
    PagedResult, TracingTranscriptLogger, TranscriptInfo, TranscriptLogger, TranscriptStore,
};
pub use memory::MemoryTranscriptStore;
pub use middleware::TranscriptLoggerMiddleware;
