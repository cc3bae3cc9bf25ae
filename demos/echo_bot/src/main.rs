//! Echo Bot Example
//!
//! A console bot that echoes what you type, built on the Parley runtime.
//!
//! # Pipeline
//!
//! ```text
//! stdin line ─▶ ConsoleAdapter
//!                 └─ [transcript] ─▶ [typing] ─▶ turn logger ─▶ EchoBot
//! ```
//!
//! Transcript logging and typing indicators are switched on by
//! configuration (`parley.toml`) or the `--transcript` / `--typing` flags.
//! The turn logger is a closure middleware that also intercepts outgoing
//! sends to count replies.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --typing --transcript
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use parley::framework::TranscriptStore;
use parley::prelude::*;
use parley::runtime::ConfigLoader;
use parley::runtime::config::TranscriptSink;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;

const HELP: &str = "\
Commands:
  /time   current local time
  /count  how many messages this bot has seen
  /fail   make the turn fail
  /help   this help";

#[derive(Debug, Parser)]
#[command(version, about = "Console echo bot")]
struct Args {
    /// Configuration file (default: search for parley.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (e.g. development, production)
    #[arg(short, long)]
    profile: Option<String>,

    /// Send typing indicators while a turn runs
    #[arg(long)]
    typing: bool,

    /// Keep an in-memory transcript and report it on exit
    #[arg(long)]
    transcript: bool,
}

// ============================================================================
// Bot
// ============================================================================

#[derive(Default)]
struct EchoBot {
    turns: AtomicU64,
}

impl Bot for EchoBot {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext) -> BoxFuture<'a, BotResult<()>> {
        Box::pin(async move {
            let Some(activity) = ctx.activity() else {
                return Ok(());
            };
            if !activity.is_type(activity_types::MESSAGE) {
                return Ok(());
            }

            let turn = self.turns.fetch_add(1, Ordering::Relaxed) + 1;
            let text = activity.text.as_deref().unwrap_or_default().trim();
            match text {
                "/help" => ctx.send_activity(HELP).await?,
                "/time" => ctx.send_activity(format!("It is {}", current_time())).await?,
                "/count" => ctx.send_activity(format!("This is message #{turn}")).await?,
                "/fail" => return Err(BotError::msg("you asked me to fail")),
                _ => ctx.send_activity(format!("You said: {text}")).await?,
            };
            Ok(())
        })
    }
}

fn current_time() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| now.to_string())
}

/// Logs how long each turn took and how many replies it sent.
fn turn_logger() -> impl Middleware {
    middleware_fn(|ctx, next| {
        Box::pin(async move {
            let started = Instant::now();
            let replies = Arc::new(AtomicUsize::new(0));

            let counter = Arc::clone(&replies);
            ctx.on_send_activities(move |_ctx, activities, next| {
                counter.fetch_add(activities.len(), Ordering::Relaxed);
                next.run(activities)
            });

            let result = next.run().await;
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                replies = replies.load(Ordering::Relaxed),
                ok = result.is_ok(),
                "Turn finished"
            );
            result
        })
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile.as_str());
    }
    let mut config = loader.load()?;

    if args.typing {
        config.typing.enabled = true;
    }
    if args.transcript {
        config.transcript.enabled = true;
        config.transcript.sink = TranscriptSink::Memory;
    }

    let runtime = BotRuntime::from_config(&config);

    let mut adapter = runtime.create_adapter::<ConsoleAdapter>()?;
    adapter.use_middleware(turn_logger());
    let adapter = Arc::new(adapter);

    println!("Echo bot ready. Type /help for commands, Ctrl+D to quit.");
    let bot = EchoBot::default();
    runtime.run(adapter.process(&bot)).await?;

    if let Some(store) = runtime.transcript_store() {
        let console = adapter.config();
        let transcript = store
            .get_transcript_activities(&console.channel_id, &console.conversation_id, None, None)
            .await?;
        info!(
            activities = transcript.items.len(),
            more = transcript.continuation_token.is_some(),
            "Transcript recorded"
        );
    }

    Ok(())
}
