//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file (or no file at all) yields
//! a usable configuration:
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! parley_core = "trace"
//!
//! [typing]
//! enabled = true
//! delay_ms = 500
//! period_ms = 2000
//!
//! [transcript]
//! enabled = true
//! sink = "memory"
//!
//! [service]
//! timeout_ms = 15000
//! concurrency_limit = 64
//!
//! [adapters.console]
//! user = "alice"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use figment::value::Value;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Typing indicator middleware.
    #[serde(default)]
    pub typing: TypingConfig,

    /// Transcript logging middleware.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Limits applied around the bot when it is served as a tower service.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-adapter sections, keyed by the adapter's name.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON (requires the `json-log` feature).
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
///
/// Defaults to stderr so that console adapters keep stdout for the
/// conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
    File,
}

/// How often a log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `parley_core = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Middleware
// =============================================================================

/// Typing indicator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Time before the first indicator, in milliseconds.
    #[serde(default = "default_typing_delay_ms")]
    pub delay_ms: u64,

    /// Time between indicators, in milliseconds. Must be positive.
    #[serde(default = "default_typing_period_ms")]
    pub period_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: default_typing_delay_ms(),
            period_ms: default_typing_period_ms(),
        }
    }
}

fn default_typing_delay_ms() -> u64 {
    500
}

fn default_typing_period_ms() -> u64 {
    2000
}

/// Where transcripts are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSink {
    /// The `parley::transcript` tracing target.
    #[default]
    Tracing,
    /// An in-memory store the application can read back.
    Memory,
}

/// Transcript logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub sink: TranscriptSink,
}

// =============================================================================
// Service
// =============================================================================

/// Tower limits for [`BotRuntime::service`](crate::BotRuntime::service).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Turns running longer than this are abandoned.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of turns in flight.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}
