//! Configuration types for the console adapter.
//!
//! Read from the `adapters.console` section:
//!
//! ```toml
//! [adapters.console]
//! user_name = "Alice"
//! prompt = "> "
//! show_traces = false
//! ```

use serde::{Deserialize, Serialize};

/// Console adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Channel id stamped on inbound activities.
    pub channel_id: String,

    pub conversation_id: String,

    pub user_id: String,
    pub user_name: String,

    pub bot_id: String,
    pub bot_name: String,

    pub locale: Option<String>,

    /// Written before each line is read, e.g. `"> "`.
    pub prompt: Option<String>,

    /// Print trace activities instead of dropping them.
    pub show_traces: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            channel_id: "console".to_string(),
            conversation_id: "Convo1".to_string(),
            user_id: "user".to_string(),
            user_name: "User1".to_string(),
            bot_id: "bot".to_string(),
            bot_name: "Bot".to_string(),
            locale: None,
            prompt: None,
            show_traces: false,
        }
    }
}
