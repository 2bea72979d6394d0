//! Agent configuration and per-run state types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;
use crate::message::Message;

/// Configuration for the turn engine's behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-dispatch rounds per turn (safety limit)
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// How many prior messages are sent back to the model each turn
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_tool_rounds() -> u32 {
    25
}
fn default_history_limit() -> usize {
    50
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            history_limit: default_history_limit(),
        }
    }
}

/// The state threaded through one invocation of the turn engine.
///
/// `messages` only ever grows and `tool_results` is merged, so the full run is
/// reconstructible from the initial state plus every applied [`StateUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
    pub should_continue: bool,
    #[serde(default)]
    pub tool_results: HashMap<String, serde_json::Value>,
}

/// The increment one engine step contributes to the state.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub should_continue: Option<bool>,
    pub tool_results: HashMap<String, serde_json::Value>,
}

impl StateUpdate {
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_continue(mut self, should_continue: bool) -> Self {
        self.should_continue = Some(should_continue);
        self
    }
}

impl AgentState {
    pub fn new(conversation_id: ConversationId, messages: Vec<Message>) -> Self {
        Self {
            conversation_id,
            messages,
            should_continue: false,
            tool_results: HashMap::new(),
        }
    }

    /// Fold a step's output into the state.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(flag) = update.should_continue {
            self.should_continue = flag;
        }
        self.tool_results.extend(update.tool_results);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
