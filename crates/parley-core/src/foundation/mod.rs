//! Foundation layer - turn data and per-turn state.
//!
//! - Activity schema and addressing records
//! - Turn-scoped state bag
//! - The turn context handed to middleware and bots

pub mod context;
pub mod schema;
pub mod state;

pub use context::{INVOKE_RESPONSE_KEY, TurnContext};
pub use schema::{
    Activity, ChannelAccount, ConversationAccount, ConversationReference, Entity,
    InvokeResponse, Mention, MessageReaction, ResourceResponse, activity_types, delivery_modes, event_names, input_hints,
};
pub use state::TurnState;
