//! Conversation and tool-execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, ToolCall};

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered, append-only message log plus a side-log of tool executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Who owns this conversation
    pub owner_id: String,

    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Ordered messages, insertion order = chronological order
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Finalized tool executions, in completion order
    #[serde(default)]
    pub tool_executions: Vec<ToolExecution>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last record was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new(owner_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            owner_id: owner_id.into(),
            title,
            messages: Vec::new(),
            tool_executions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append messages to the log.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.updated_at = Utc::now();
        self.messages.extend(messages);
    }

    /// Append a tool-execution record.
    pub fn record_execution(&mut self, execution: ToolExecution) {
        self.updated_at = Utc::now();
        self.tool_executions.push(execution);
    }

    /// The last `limit` messages, oldest of the window first.
    pub fn recent(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

/// Lifecycle status of a tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending => "pending",
            ToolStatus::Running => "running",
            ToolStatus::Completed => "completed",
            ToolStatus::Failed => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Failed)
    }
}

/// A record of one attempted tool call.
///
/// `begin` produces a running record; `complete` and `fail` consume it, so a
/// finalized record cannot be finalized again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: String,
    pub conversation_id: ConversationId,
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub status: ToolStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ToolExecution {
    /// Start tracking a tool call.
    pub fn begin(conversation_id: &ConversationId, call: &ToolCall, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input,
            output: None,
            status: ToolStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn complete(self, output: serde_json::Value) -> Self {
        self.finish(ToolStatus::Completed, output)
    }

    pub fn fail(self, error: impl std::fmt::Display) -> Self {
        let payload = serde_json::json!({ "error": error.to_string() });
        self.finish(ToolStatus::Failed, payload)
    }

    fn finish(mut self, status: ToolStatus, output: serde_json::Value) -> Self {
        self.status = status;
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}
