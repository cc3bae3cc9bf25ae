//! Integration layer - the seams to channels and bot logic.
//!
//! - Channel adapter contract and the turn pipeline
//! - Bot callback trait

pub mod adapter;
pub mod bot;

pub use adapter::{BotAdapter, ConfigurableAdapter, OnTurnError, Pipeline};
pub use bot::{Bot, BotFn, bot_fn};
