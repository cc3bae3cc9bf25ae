//! Activity-type dispatch.
//!
//! [`ActivityHandler`] splits a turn by activity type into overridable
//! methods; every method defaults to doing nothing. Wrap a handler in
//! [`ActivityBot`] to run it as the pipeline's [`Bot`]:
//!
//! ```rust,ignore
//! struct Greeter;
//!
//! #[async_trait]
//! impl ActivityHandler for Greeter {
//!     async fn on_message_activity(&self, ctx: &TurnContext) -> BotResult<()> {
//!         ctx.send_activity("Hello!").await?;
//!         Ok(())
//!     }
//!
//!     async fn on_members_added(&self, members: &[ChannelAccount], ctx: &TurnContext) -> BotResult<()> {
//!         for member in members {
//!             ctx.send_activity(format!("Welcome, {}!", member.id)).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! adapter.run_pipeline(&ctx, Some(&ActivityBot::new(Greeter))).await?;
//! ```

use async_trait::async_trait;
use parley_core::{
    Activity, Bot, BotError, BotResult, BoxFuture, ChannelAccount, INVOKE_RESPONSE_KEY,
    InvokeResponse, MessageReaction, TurnContext, activity_types, event_names,
};
use tracing::trace;

/// Per-activity-type turn handling.
///
/// Override the methods for the activity types the bot cares about.
/// Overriding a dispatching method (`on_conversation_update_activity`,
/// `on_message_reaction_activity`, `on_event_activity`,
/// `on_installation_update`) replaces its routing to the finer-grained
/// methods below it.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Routes the turn by activity type. Fails with a contract violation
    /// if the turn has no activity or the activity has no type.
    async fn handle_turn(&self, ctx: &TurnContext) -> BotResult<()> {
        dispatch_activity(self, ctx).await
    }

    async fn on_message_activity(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    /// Calls [`on_members_added`](Self::on_members_added) or, if nobody
    /// but the bot joined, [`on_members_removed`](Self::on_members_removed).
    /// The bot itself (the activity's recipient) is never reported.
    async fn on_conversation_update_activity(&self, ctx: &TurnContext) -> BotResult<()> {
        let Some(activity) = ctx.activity() else {
            return Ok(());
        };

        let added = members_except_recipient(activity, &activity.members_added);
        if !added.is_empty() {
            return self.on_members_added(&added, ctx).await;
        }

        let removed = members_except_recipient(activity, &activity.members_removed);
        if !removed.is_empty() {
            return self.on_members_removed(&removed, ctx).await;
        }

        Ok(())
    }

    async fn on_members_added(
        &self,
        _members: &[ChannelAccount],
        _ctx: &TurnContext,
    ) -> BotResult<()> {
        Ok(())
    }

    async fn on_members_removed(
        &self,
        _members: &[ChannelAccount],
        _ctx: &TurnContext,
    ) -> BotResult<()> {
        Ok(())
    }

    /// Calls [`on_reactions_added`](Self::on_reactions_added) and then
    /// [`on_reactions_removed`](Self::on_reactions_removed), each only if
    /// the activity carries such reactions.
    async fn on_message_reaction_activity(&self, ctx: &TurnContext) -> BotResult<()> {
        let Some(activity) = ctx.activity() else {
            return Ok(());
        };
        if !activity.reactions_added.is_empty() {
            self.on_reactions_added(&activity.reactions_added, ctx).await?;
        }
        if !activity.reactions_removed.is_empty() {
            self.on_reactions_removed(&activity.reactions_removed, ctx).await?;
        }
        Ok(())
    }

    async fn on_reactions_added(
        &self,
        _reactions: &[MessageReaction],
        _ctx: &TurnContext,
    ) -> BotResult<()> {
        Ok(())
    }

    async fn on_reactions_removed(
        &self,
        _reactions: &[MessageReaction],
        _ctx: &TurnContext,
    ) -> BotResult<()> {
        Ok(())
    }

    /// `tokens/response` events go to
    /// [`on_token_response_event`](Self::on_token_response_event), all
    /// others to [`on_event`](Self::on_event).
    async fn on_event_activity(&self, ctx: &TurnContext) -> BotResult<()> {
        let name = ctx.activity().and_then(|a| a.name.as_deref());
        if name == Some(event_names::TOKEN_RESPONSE) {
            self.on_token_response_event(ctx).await
        } else {
            self.on_event(ctx).await
        }
    }

    async fn on_token_response_event(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    async fn on_event(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    /// Handles an `invoke` activity.
    ///
    /// A returned response is sent back as an `invokeResponse` activity
    /// unless one was already sent this turn. Defaults to 501.
    async fn on_invoke_activity(&self, _ctx: &TurnContext) -> BotResult<Option<InvokeResponse>> {
        Ok(Some(InvokeResponse::new(501)))
    }

    async fn on_end_of_conversation_activity(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    async fn on_typing_activity(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    /// Routes `add`/`add-upgrade` and `remove`/`remove-upgrade` actions.
    async fn on_installation_update(&self, ctx: &TurnContext) -> BotResult<()> {
        match ctx.activity().and_then(|a| a.action.as_deref()) {
            Some("add" | "add-upgrade") => self.on_installation_update_add(ctx).await,
            Some("remove" | "remove-upgrade") => self.on_installation_update_remove(ctx).await,
            _ => Ok(()),
        }
    }

    async fn on_installation_update_add(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    async fn on_installation_update_remove(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }

    /// Any activity type not listed above.
    async fn on_unrecognized_activity_type(&self, _ctx: &TurnContext) -> BotResult<()> {
        Ok(())
    }
}

/// The default body of [`ActivityHandler::handle_turn`], callable from an
/// override that adds work before or after the type-specific methods.
pub async fn dispatch_activity<H>(handler: &H, ctx: &TurnContext) -> BotResult<()>
where
    H: ActivityHandler + ?Sized,
{
    let activity = ctx
        .activity()
        .ok_or_else(|| BotError::contract("activity handlers require an inbound activity"))?;
    let activity_type = activity
        .activity_type
        .as_deref()
        .ok_or_else(|| BotError::contract("inbound activity has no type"))?;

    trace!(activity_type, "Dispatching activity");
    match activity_type {
        activity_types::MESSAGE => handler.on_message_activity(ctx).await,
        activity_types::CONVERSATION_UPDATE => handler.on_conversation_update_activity(ctx).await,
        activity_types::MESSAGE_REACTION => handler.on_message_reaction_activity(ctx).await,
        activity_types::EVENT => handler.on_event_activity(ctx).await,
        activity_types::INVOKE => {
            let response = handler.on_invoke_activity(ctx).await?;
            if let Some(response) = response {
                if !ctx.turn_state().has(INVOKE_RESPONSE_KEY) {
                    let mut reply = Activity::new(activity_types::INVOKE_RESPONSE);
                    reply.value = Some(serde_json::to_value(response)?);
                    ctx.send_activity(reply).await?;
                }
            }
            Ok(())
        }
        activity_types::END_OF_CONVERSATION => handler.on_end_of_conversation_activity(ctx).await,
        activity_types::TYPING => handler.on_typing_activity(ctx).await,
        activity_types::INSTALLATION_UPDATE => handler.on_installation_update(ctx).await,
        _ => handler.on_unrecognized_activity_type(ctx).await,
    }
}

fn members_except_recipient(
    activity: &Activity,
    members: &[ChannelAccount],
) -> Vec<ChannelAccount> {
    let recipient = activity.recipient.as_ref().map(|r| r.id.as_str());
    members
        .iter()
        .filter(|m| Some(m.id.as_str()) != recipient)
        .cloned()
        .collect()
}

/// Runs an [`ActivityHandler`] as a [`Bot`].
#[derive(Debug, Clone, Default)]
pub struct ActivityBot<H>(H);

impl<H: ActivityHandler> ActivityBot<H> {
    pub fn new(handler: H) -> Self {
        Self(handler)
    }

    pub fn handler(&self) -> &H {
        &self.0
    }

    pub fn into_inner(self) -> H {
        self.0
    }
}

impl<H: ActivityHandler> Bot for ActivityBot<H> {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext) -> BoxFuture<'a, BotResult<()>> {
        self.0.handle_turn(ctx)
    }
}
