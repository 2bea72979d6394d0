//! Message domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the user types a line → the turn engine records it → the model answers or
//! requests tools → tool results are fed back as messages.
//!
//! A [`Message`] is a sum type with exactly three variants. Tool-call metadata
//! only exists on [`Message::Assistant`], and call linkage only on
//! [`Message::Tool`], so a message can never carry fields of the wrong role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// The role tag of a message. Used for persistence and wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call requested by the model inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call (tool results link back to it)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as the raw JSON text emitted by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument text. Empty text means "no arguments".
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments).map_err(|e| {
            ToolError::InvalidArguments(format!("{}: arguments are not valid JSON: {e}", self.name))
        })
    }
}

/// A single conversational utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        /// May be empty when the message only requests tools.
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        timestamp: DateTime<Utc>,
    },
    Tool {
        /// The `ToolCall::id` this result answers.
        tool_call_id: String,
        tool_name: String,
        /// JSON payload: the provider result, or `{"error": ...}`.
        content: String,
        #[serde(default)]
        is_error: bool,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::assistant_with_tools(content, Vec::new())
    }

    /// Create an assistant message that requests tools.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
            timestamp: Utc::now(),
        }
    }

    /// Create a successful tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result carrying an error payload.
    pub fn tool_error(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl std::fmt::Display,
    ) -> Self {
        let payload = serde_json::json!({ "error": error.to_string() });
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: payload.to_string(),
            is_error: true,
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::User { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::Tool { timestamp, .. } => *timestamp,
        }
    }

    /// Tool calls requested by this message; empty for non-assistant messages.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// The originating call id, for tool result messages.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Whether this is an assistant message with at least one tool call.
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "Hello, agent!");
        assert!(msg.tool_calls().is_empty());
        assert!(msg.tool_call_id().is_none());
    }

    #[test]
    fn assistant_with_tools_requests_tools() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "list_directory", r#"{"path":"/tmp"}"#)],
        );
        assert!(msg.requests_tools());
        assert_eq!(msg.content(), "");
        assert_eq!(msg.tool_calls()[0].name, "list_directory");
    }

    #[test]
    fn tool_error_carries_error_payload() {
        let msg = Message::tool_error("call_9", "read_file", "no such file");
        match &msg {
            Message::Tool { is_error, content, tool_call_id, .. } => {
                assert!(is_error);
                assert_eq!(tool_call_id, "call_9");
                let payload: serde_json::Value = serde_json::from_str(content).unwrap();
                assert_eq!(payload["error"], "no such file");
            }
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[test]
    fn serialized_message_is_tagged_by_role() {
        let msg = Message::tool_result("call_1", "list_directory", r#"["a.txt"]"#);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn plain_assistant_omits_tool_calls_field() {
        let json = serde_json::to_value(Message::assistant("done")).unwrap();
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn parsed_arguments_handles_empty_and_invalid() {
        let empty = ToolCall::new("c", "t", "");
        assert_eq!(empty.parsed_arguments().unwrap(), serde_json::json!({}));

        let bad = ToolCall::new("c", "t", "{not json");
        assert!(matches!(
            bad.parsed_arguments(),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
