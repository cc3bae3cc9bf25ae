//! Console adapter.
//!
//! Every line read from the input becomes a `message` activity and runs as
//! one turn. Whatever the bot sends is written to the output, one line per
//! activity:
//!
//! - `message` activities print their text
//! - `delay` activities pause output for `value` milliseconds
//! - `trace` activities are dropped unless `show_traces` is set
//! - anything else prints as `[type]`
//!
//! Updating and deleting sent activities is not possible on a terminal;
//! both fail with a channel error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parley_core::{
    Activity, Bot, BotAdapter, BotError, BotResult, ChannelAccount, ConfigurableAdapter,
    ConversationAccount, ConversationReference, Middleware, Pipeline, ResourceResponse,
    TurnContext, activity_types,
};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::config::ConsoleConfig;

type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// An adapter that talks to the user over stdin and stdout.
///
/// ```rust,ignore
/// let adapter = Arc::new(ConsoleAdapter::new().with_middleware(MyMiddleware));
/// adapter.process(&my_bot).await?;
/// ```
pub struct ConsoleAdapter {
    pipeline: Pipeline,
    config: ConsoleConfig,
    output: Mutex<Output>,
    next_inbound_id: AtomicU64,
    next_outbound_id: AtomicU64,
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        Self {
            pipeline: Pipeline::new(),
            config,
            output: Mutex::new(Box::new(tokio::io::stdout())),
            next_inbound_id: AtomicU64::new(0),
            next_outbound_id: AtomicU64::new(0),
        }
    }

    /// Writes bot output to `writer` instead of stdout.
    pub fn with_output<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.output = Mutex::new(Box::new(writer));
        self
    }

    /// Appends a middleware (builder pattern).
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.use_middleware(middleware);
        self
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Builds the inbound message for one line of input.
    pub fn make_activity(&self, text: impl Into<String>) -> Activity {
        let id = self.next_inbound_id.fetch_add(1, Ordering::Relaxed) + 1;
        let config = &self.config;

        let mut activity = Activity::message(text);
        activity.id = Some(id.to_string());
        activity.timestamp = Some(OffsetDateTime::now_utc());
        activity.channel_id = Some(config.channel_id.clone());
        activity.locale.clone_from(&config.locale);
        activity.from = Some(ChannelAccount::new(
            config.user_id.as_str(),
            config.user_name.as_str(),
        ));
        activity.recipient = Some(ChannelAccount::new(
            config.bot_id.as_str(),
            config.bot_name.as_str(),
        ));
        activity.conversation = Some(ConversationAccount::new(config.conversation_id.as_str()));
        activity
    }

    /// Runs one turn per line of stdin until it is closed.
    pub async fn process(self: &Arc<Self>, bot: &dyn Bot) -> BotResult<()> {
        self.process_input(BufReader::new(tokio::io::stdin()), bot)
            .await
    }

    /// Runs one turn per line of `input` until it is exhausted.
    ///
    /// Blank lines are skipped. A failed turn is logged and does not stop
    /// the loop; only a read error does.
    pub async fn process_input<R>(self: &Arc<Self>, input: R, bot: &dyn Bot) -> BotResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            if let Some(prompt) = &self.config.prompt {
                self.write(prompt).await?;
            }

            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => return Err(BotError::channel(format!("failed to read input: {err}"))),
            };

            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            let activity = self.make_activity(text);
            trace!(id = ?activity.id, "Console input");
            let ctx = TurnContext::new(Arc::clone(self) as Arc<dyn BotAdapter>, activity);
            if let Err(err) = self.run_pipeline(&ctx, Some(bot)).await {
                error!(error = %err, "Turn failed");
            }
        }

        debug!("Console input closed");
        Ok(())
    }

    /// The line printed for `activity`, if any.
    fn render(&self, activity: &Activity) -> Option<String> {
        let activity_type = activity.activity_type.as_deref().unwrap_or_default();
        match activity_type {
            activity_types::MESSAGE => Some(activity.text.clone().unwrap_or_default()),
            activity_types::DELAY => None,
            activity_types::TRACE if !self.config.show_traces => None,
            activity_types::TRACE => {
                let name = activity.name.as_deref().unwrap_or_default();
                Some(match &activity.value {
                    Some(value) => format!("[trace] {name}: {value}"),
                    None => format!("[trace] {name}"),
                })
            }
            other => Some(format!("[{other}]")),
        }
    }

    async fn write(&self, text: &str) -> BotResult<()> {
        let mut output = self.output.lock().await;
        output
            .write_all(text.as_bytes())
            .await
            .map_err(|err| BotError::channel(format!("failed to write output: {err}")))?;
        output
            .flush()
            .await
            .map_err(|err| BotError::channel(format!("failed to write output: {err}")))
    }
}

#[async_trait]
impl BotAdapter for ConsoleAdapter {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    async fn send_activities(
        &self,
        _ctx: &TurnContext,
        activities: &[Activity],
    ) -> BotResult<Vec<ResourceResponse>> {
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            if activity.is_type(activity_types::DELAY) {
                tokio::time::sleep(activity.delay_duration()).await;
            } else if let Some(line) = self.render(activity) {
                self.write(&format!("{line}\n")).await?;
            }

            let id = self.next_outbound_id.fetch_add(1, Ordering::Relaxed) + 1;
            responses.push(ResourceResponse::new(format!("out-{id}")));
        }
        Ok(responses)
    }

    async fn update_activity(
        &self,
        _ctx: &TurnContext,
        _activity: &Activity,
    ) -> BotResult<ResourceResponse> {
        Err(BotError::channel("the console cannot update sent activities"))
    }

    async fn delete_activity(
        &self,
        _ctx: &TurnContext,
        _reference: &ConversationReference,
    ) -> BotResult<()> {
        Err(BotError::channel("the console cannot delete sent activities"))
    }
}

impl ConfigurableAdapter for ConsoleAdapter {
    type Config = ConsoleConfig;

    fn name() -> &'static str {
        "console"
    }

    fn from_config(config: Self::Config) -> BotResult<Self> {
        Ok(Self::with_config(config))
    }
}
