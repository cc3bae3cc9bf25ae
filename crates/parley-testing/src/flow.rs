//! Scripted conversations.

use std::sync::Arc;

use parley_core::{Activity, Bot, BotError};
use thiserror::Error;
use tracing::debug;

use crate::adapter::TestAdapter;

/// Why a [`TestFlow`] stopped.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The turn itself failed.
    #[error("turn failed: {0}")]
    Turn(#[from] BotError),

    #[error("step {step}: expected a reply matching {expected}, but none was sent")]
    NoReply { step: usize, expected: String },

    #[error("step {step}: expected {expected}, got {actual:?}")]
    UnexpectedReply {
        step: usize,
        expected: String,
        actual: Option<String>,
    },

    #[error("step {step}: expected no reply, got {actual:?}")]
    UnexpectedExtraReply { step: usize, actual: Option<String> },
}

type ReplyCheck = Box<dyn Fn(&Activity) -> Result<(), String> + Send + Sync>;

enum Step {
    Send(Activity),
    AssertReply { description: String, check: ReplyCheck },
    AssertNoReply,
}

/// A scripted exchange between a user and a bot.
///
/// Steps run in order when [`run`](Self::run) is awaited. Every send runs a
/// complete turn, so replies are available to the assertions that follow.
///
/// ```rust,ignore
/// TestFlow::new(TestAdapter::new(), echo_bot)
///     .send("hi")
///     .assert_reply("echo: hi")
///     .assert_no_reply()
///     .run()
///     .await?;
/// ```
pub struct TestFlow {
    adapter: TestAdapter,
    bot: Arc<dyn Bot>,
    steps: Vec<Step>,
}

impl TestFlow {
    pub fn new(adapter: TestAdapter, bot: impl Bot + 'static) -> Self {
        Self {
            adapter,
            bot: Arc::new(bot),
            steps: Vec::new(),
        }
    }

    /// The adapter driving this flow.
    pub fn adapter(&self) -> &TestAdapter {
        &self.adapter
    }

    /// Sends a user message or activity.
    pub fn send(mut self, activity: impl Into<Activity>) -> Self {
        self.steps.push(Step::Send(activity.into()));
        self
    }

    /// Expects the next reply to carry exactly `text`.
    pub fn assert_reply(mut self, text: impl Into<String>) -> Self {
        let expected = text.into();
        let wanted = expected.clone();
        self.steps.push(Step::AssertReply {
            description: format!("{expected:?}"),
            check: Box::new(move |reply| {
                if reply.text.as_deref() == Some(wanted.as_str()) {
                    Ok(())
                } else {
                    Err(format!("{wanted:?}"))
                }
            }),
        });
        self
    }

    /// Expects the next reply to be one of `candidates`.
    pub fn assert_reply_one_of<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
        let description = format!("one of {candidates:?}");
        let expected = description.clone();
        self.steps.push(Step::AssertReply {
            description,
            check: Box::new(move |reply| {
                let text = reply.text.as_deref().unwrap_or_default();
                if candidates.iter().any(|c| c == text) {
                    Ok(())
                } else {
                    Err(expected.clone())
                }
            }),
        });
        self
    }

    /// Expects the next reply to pass `check`, which returns a description
    /// of what was expected on failure.
    pub fn assert_reply_with<F>(mut self, description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Activity) -> Result<(), String> + Send + Sync + 'static,
    {
        self.steps.push(Step::AssertReply {
            description: description.into(),
            check: Box::new(check),
        });
        self
    }

    /// Expects no unread replies.
    pub fn assert_no_reply(mut self) -> Self {
        self.steps.push(Step::AssertNoReply);
        self
    }

    /// Shorthand for `send(user_says).assert_reply(expected)`.
    pub fn test(self, user_says: impl Into<Activity>, expected: impl Into<String>) -> Self {
        self.send(user_says).assert_reply(expected)
    }

    /// Runs every step in order, stopping at the first failure.
    pub async fn run(self) -> Result<(), FlowError> {
        for (index, step) in self.steps.into_iter().enumerate() {
            let step_number = index + 1;
            match step {
                Step::Send(activity) => {
                    debug!(step = step_number, text = ?activity.text, "Flow send");
                    self.adapter
                        .receive_activity(activity, self.bot.as_ref())
                        .await?;
                }
                Step::AssertReply { description, check } => {
                    let Some(reply) = self.adapter.next_reply() else {
                        return Err(FlowError::NoReply {
                            step: step_number,
                            expected: description,
                        });
                    };
                    if let Err(expected) = check(&reply) {
                        return Err(FlowError::UnexpectedReply {
                            step: step_number,
                            expected,
                            actual: reply.text,
                        });
                    }
                }
                Step::AssertNoReply => {
                    if let Some(reply) = self.adapter.next_reply() {
                        return Err(FlowError::UnexpectedExtraReply {
                            step: step_number,
                            actual: reply.text,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
