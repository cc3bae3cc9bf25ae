//! Process-level wiring for a bot.
//!
//! [`BotRuntime`] turns a [`ParleyConfig`] into a working process: it
//! initializes logging, builds adapters from their configuration sections,
//! installs the built-in middleware the configuration enables, and runs the
//! adapter's receive loop until it ends or a shutdown signal arrives.
//!
//! ```rust,ignore
//! let runtime = BotRuntime::builder().config_file("parley.toml").build()?;
//! let adapter = Arc::new(runtime.create_adapter::<ConsoleAdapter>()?);
//!
//! runtime.run(adapter.process(&EchoBot)).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_core::{
    Activity, Bot, BotAdapter, BotError, BotResult, BoxFuture, ConfigurableAdapter, TurnContext,
};
use parley_framework::{
    BotService, MemoryTranscriptStore, ShowTypingMiddleware, TracingTranscriptLogger,
    TranscriptLoggerMiddleware, TurnOutcome,
};
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, ParleyConfig, TranscriptSink};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Text sent to the user by the default turn error handler.
pub const TURN_ERROR_MESSAGE: &str = "The bot encountered an error or bug.";

/// A bot process assembled from configuration.
#[derive(Debug, Clone)]
pub struct BotRuntime {
    config: ParleyConfig,
    /// Set when transcripts go to the in-memory store.
    transcript_store: Option<Arc<MemoryTranscriptStore>>,
}

impl BotRuntime {
    /// Loads configuration from the current directory, falling back to the
    /// defaults if it cannot be loaded.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                ParleyConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from already loaded configuration and initializes
    /// logging (unless a subscriber is already installed).
    pub fn from_config(config: &ParleyConfig) -> Self {
        logging::init_from_config(&config.logging);

        let transcript_store = (config.transcript.enabled
            && config.transcript.sink == TranscriptSink::Memory)
            .then(|| Arc::new(MemoryTranscriptStore::new()));

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            typing = config.typing.enabled,
            transcript = config.transcript.enabled,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            transcript_store,
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// The in-memory transcript store, when `transcript.sink` is `memory`.
    pub fn transcript_store(&self) -> Option<&Arc<MemoryTranscriptStore>> {
        self.transcript_store.as_ref()
    }

    /// Builds an adapter from its `adapters.<name>` section and configures
    /// its pipeline.
    ///
    /// A missing section falls back to the adapter's default configuration.
    pub fn create_adapter<A>(&self) -> RuntimeResult<A>
    where
        A: ConfigurableAdapter,
    {
        let name = A::name();

        let config: A::Config = match self.config.adapters.get(name) {
            Some(section) => section.deserialize().map_err(|e| {
                RuntimeError::AdapterConfigDeserialize(format!(
                    "Failed to deserialize config for adapter '{name}': {e}"
                ))
            })?,
            None => {
                warn!(adapter = name, "No configuration found for adapter, using default");
                A::Config::default()
            }
        };

        let mut adapter = A::from_config(config)?;
        self.configure(&mut adapter)?;
        info!(adapter = name, "Adapter created");
        Ok(adapter)
    }

    /// Installs the middleware enabled in the configuration, and the
    /// default turn error handler if the adapter has none.
    ///
    /// Transcript logging goes first so that it observes every activity the
    /// rest of the pipeline sends.
    pub fn configure<A>(&self, adapter: &mut A) -> RuntimeResult<()>
    where
        A: BotAdapter,
    {
        let transcript = &self.config.transcript;
        if transcript.enabled {
            let middleware = match &self.transcript_store {
                Some(store) => TranscriptLoggerMiddleware::from_shared(store.clone()),
                None => TranscriptLoggerMiddleware::new(TracingTranscriptLogger),
            };
            adapter.use_middleware(middleware);
            debug!(sink = ?transcript.sink, "Transcript logging enabled");
        }

        let typing = &self.config.typing;
        if typing.enabled {
            adapter.use_middleware(ShowTypingMiddleware::new(
                Duration::from_millis(typing.delay_ms),
                Duration::from_millis(typing.period_ms),
            )?);
            debug!(
                delay_ms = typing.delay_ms,
                period_ms = typing.period_ms,
                "Typing indicator enabled"
            );
        }

        if adapter.pipeline().on_turn_error().is_none() {
            adapter.on_turn_error(report_turn_error);
        }

        Ok(())
    }

    /// Wraps `bot` in a tower service with the configured timeout and
    /// concurrency limit.
    pub fn service<B>(
        &self,
        adapter: Arc<dyn BotAdapter>,
        bot: B,
    ) -> BoxCloneService<Activity, TurnOutcome, BoxError>
    where
        B: Bot + 'static,
    {
        let service = &self.config.service;
        let timeout = service.timeout_ms.map(Duration::from_millis);

        BoxCloneService::new(
            ServiceBuilder::new()
                .option_layer(timeout.map(TimeoutLayer::new))
                .option_layer(service.concurrency_limit.map(ConcurrencyLimitLayer::new))
                .service(BotService::new(adapter, bot)),
        )
    }

    /// Runs `serve` (typically an adapter's receive loop) until it finishes
    /// or Ctrl+C / SIGTERM is received.
    pub async fn run<F>(&self, serve: F) -> RuntimeResult<()>
    where
        F: Future<Output = BotResult<()>>,
    {
        info!("Parley runtime is now running. Press Ctrl+C to stop.");

        tokio::select! {
            result = serve => {
                result?;
                info!("Adapter finished, shutting down");
            }
            signal = wait_for_shutdown() => signal?,
        }

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs `serve` until it finishes or `shutdown` completes.
    pub async fn run_until<F, S>(&self, serve: F, shutdown: S) -> RuntimeResult<()>
    where
        F: Future<Output = BotResult<()>>,
        S: Future<Output = ()>,
    {
        tokio::select! {
            result = serve => result?,
            () = shutdown => info!("Shutdown requested"),
        }
        Ok(())
    }
}

impl Default for BotRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs the error, then tells the user something went wrong. A trace
/// activity carrying the error text goes out first for channels that show
/// traces (the emulator, test adapters).
fn report_turn_error(ctx: &TurnContext, err: BotError) -> BoxFuture<'_, BotResult<()>> {
    Box::pin(async move {
        error!(error = %err, "Unhandled error during turn");
        ctx.send_trace_activity(
            "OnTurnError Trace",
            Some(serde_json::Value::String(err.to_string())),
            Some("https://www.botframework.com/schemas/error"),
            Some("TurnError"),
        )
        .await?;
        ctx.send_activity(TURN_ERROR_MESSAGE).await?;
        Ok(())
    })
}

async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BotRuntime`] with custom configuration sources.
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<BotRuntime> {
        let config = self.config_loader.load()?;
        Ok(BotRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::value::Value;
    use parley_core::bot_fn;
    use parley_framework::TranscriptStore;
    use parley_testing::TestAdapter;
    use tower::ServiceExt;

    fn echo() -> impl Bot {
        bot_fn(|ctx| {
            Box::pin(async move {
                let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
                ctx.send_activity(format!("echo: {text}")).await?;
                Ok(())
            })
        })
    }

    fn failing() -> impl Bot {
        bot_fn(|_ctx| Box::pin(async { Err::<(), _>(BotError::msg("boom")) }))
    }

    #[tokio::test]
    async fn test_configure_installs_enabled_middleware() {
        let mut config = ParleyConfig::default();
        config.typing.enabled = true;
        config.transcript.enabled = true;
        config.transcript.sink = TranscriptSink::Memory;
        let runtime = BotRuntime::from_config(&config);

        let mut adapter = TestAdapter::new();
        runtime.configure(&mut adapter).unwrap();
        assert_eq!(adapter.pipeline().middleware().len(), 2);

        adapter.send("hi", &echo()).await.unwrap();

        let store = runtime.transcript_store().unwrap();
        let logged = store
            .get_transcript_activities("test", "Convo1", None, None)
            .await
            .unwrap();
        assert_eq!(logged.items.len(), 2);
    }

    #[tokio::test]
    async fn test_default_config_adds_no_middleware() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let mut adapter = TestAdapter::new();
        runtime.configure(&mut adapter).unwrap();

        assert!(adapter.pipeline().middleware().is_empty());
        assert!(adapter.pipeline().on_turn_error().is_some());
        assert!(runtime.transcript_store().is_none());
    }

    #[tokio::test]
    async fn test_default_turn_error_handler_replies() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let mut adapter = TestAdapter::new().with_trace_activities();
        runtime.configure(&mut adapter).unwrap();

        adapter.send("hi", &failing()).await.unwrap();

        let replies = adapter.take_replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].label.as_deref(), Some("TurnError"));
        assert_eq!(replies[1].text.as_deref(), Some(TURN_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_existing_turn_error_handler_is_kept() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let mut adapter = TestAdapter::new();
        adapter.on_turn_error(|ctx, _err| {
            Box::pin(async move {
                ctx.send_activity("custom").await?;
                Ok(())
            })
        });
        runtime.configure(&mut adapter).unwrap();

        adapter.send("hi", &failing()).await.unwrap();

        assert_eq!(adapter.next_reply().unwrap().text.as_deref(), Some("custom"));
    }

    #[tokio::test]
    async fn test_create_adapter_reads_its_section() {
        let mut config = ParleyConfig::default();
        config.adapters.insert(
            "test".into(),
            Value::serialize(serde_json::json!({ "conversation_id": "from-config" })).unwrap(),
        );
        let runtime = BotRuntime::from_config(&config);

        let adapter = runtime.create_adapter::<TestAdapter>().unwrap();

        assert_eq!(adapter.template().conversation_id(), Some("from-config"));
        assert!(adapter.pipeline().on_turn_error().is_some());
    }

    #[tokio::test]
    async fn test_create_adapter_rejects_malformed_section() {
        let mut config = ParleyConfig::default();
        config.adapters.insert(
            "test".into(),
            Value::serialize(serde_json::json!({ "user_id": [1, 2] })).unwrap(),
        );
        let runtime = BotRuntime::from_config(&config);

        let err = runtime.create_adapter::<TestAdapter>().unwrap_err();
        assert!(matches!(err, RuntimeError::AdapterConfigDeserialize(_)));
    }

    #[tokio::test]
    async fn test_create_adapter_without_section_uses_defaults() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let adapter = runtime.create_adapter::<TestAdapter>().unwrap();
        assert_eq!(adapter.template().conversation_id(), Some("Convo1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_applies_configured_timeout() {
        let mut config = ParleyConfig::default();
        config.service.timeout_ms = Some(1000);
        let runtime = BotRuntime::from_config(&config);

        let adapter = TestAdapter::new();
        let slow = bot_fn(|ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                ctx.send_activity("too late").await?;
                Ok(())
            })
        });
        let service = runtime.service(Arc::new(adapter.clone()), slow);

        let err = service
            .oneshot(adapter.make_activity("hi"))
            .await
            .unwrap_err();
        assert!(err.is::<tower::timeout::error::Elapsed>());
    }

    #[tokio::test]
    async fn test_service_without_limits_runs_turn() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let adapter = TestAdapter::new();
        let service = runtime.service(Arc::new(adapter.clone()), echo());

        let outcome = service.oneshot(adapter.make_activity("hi")).await.unwrap();

        assert!(outcome.responded);
        assert_eq!(adapter.next_reply().unwrap().text.as_deref(), Some("echo: hi"));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let result = runtime
            .run_until(futures::future::pending(), futures::future::ready(()))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_propagates_serve_error() {
        let runtime = BotRuntime::from_config(&ParleyConfig::default());
        let result = runtime
            .run_until(
                async { Err::<(), _>(BotError::channel("stdin closed")) },
                futures::future::pending(),
            )
            .await;
        assert!(matches!(result, Err(RuntimeError::Bot(BotError::Channel(_)))));
    }
}
