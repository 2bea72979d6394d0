//! DurableStore trait: the best-effort secondary conversation tier.
//!
//! The in-process store is authoritative during a session; a durable store
//! only mirrors writes so that out-of-session features (history browsing,
//! dashboards) can read them later.
//!
//! Implementations: SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, ConversationId, ToolExecution};
use crate::error::StoreError;
use crate::message::Message;

/// A row in a conversation listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// The backend name (e.g., "sqlite").
    fn name(&self) -> &str;

    /// Mirror a newly created conversation.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Append messages to a conversation's log.
    async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<(), StoreError>;

    /// Append a finalized tool-execution record.
    async fn append_tool_execution(
        &self,
        conversation_id: &ConversationId,
        execution: &ToolExecution,
    ) -> Result<(), StoreError>;

    /// Load a conversation's messages in insertion order.
    async fn load_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, StoreError>;

    /// List conversations, most recently updated first.
    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>, StoreError>;
}
