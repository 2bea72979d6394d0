//! Two-tier write-through conversation store.
//!
//! The primary tier is an in-process map and the only read path during a
//! session. Every write is mirrored to the durable tier while it is
//! available; the first durable failure disables mirroring for the rest of
//! the process. Durable failures never reach the caller.
//!
//! Unknown conversation ids read as empty and drop writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use codewright_core::conversation::{Conversation, ConversationId, ToolExecution};
use codewright_core::error::StoreError;
use codewright_core::event::{DomainEvent, EventBus};
use codewright_core::message::Message;
use codewright_core::store::DurableStore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// What happened to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written to both tiers.
    Mirrored,
    /// Written to the primary tier only.
    PrimaryOnly,
    /// The conversation is unknown; nothing was written.
    Dropped,
}

pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    durable: Option<Arc<dyn DurableStore>>,
    durable_available: AtomicBool,
    event_bus: Option<Arc<EventBus>>,
}

impl ConversationStore {
    /// A store with no durable tier.
    pub fn in_memory() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            durable: None,
            durable_available: AtomicBool::new(false),
            event_bus: None,
        }
    }

    /// A store mirroring writes to `durable`.
    pub fn with_durable(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            durable: Some(durable),
            durable_available: AtomicBool::new(true),
            ..Self::in_memory()
        }
    }

    /// Publish `DurableTierDisabled` on this bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Whether writes are still being mirrored.
    pub fn is_durable_available(&self) -> bool {
        self.durable_available.load(Ordering::SeqCst)
    }

    /// Allocate a new conversation and mirror its creation.
    pub async fn create_conversation(
        &self,
        owner_id: impl Into<String>,
        title: Option<String>,
    ) -> Conversation {
        let conversation = Conversation::new(owner_id, title);
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());

        if let Some(durable) = self.active_durable() {
            let result = durable.create_conversation(&conversation).await;
            self.settle(durable.as_ref(), "create_conversation", result);
        }

        debug!(conversation_id = %conversation.id, "Conversation created");
        conversation
    }

    /// Append messages to a conversation's log, in order.
    pub async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> WriteOutcome {
        {
            let mut conversations = self.conversations.write().await;
            let Some(conversation) = conversations.get_mut(conversation_id) else {
                debug!(conversation_id = %conversation_id, "Dropping messages for unknown conversation");
                return WriteOutcome::Dropped;
            };
            conversation.extend(messages.iter().cloned());
        }

        match self.active_durable() {
            Some(durable) => {
                let result = durable.append_messages(conversation_id, messages).await;
                self.settle(durable.as_ref(), "append_messages", result)
            }
            None => WriteOutcome::PrimaryOnly,
        }
    }

    /// Append a finalized tool-execution record.
    pub async fn append_tool_execution(
        &self,
        conversation_id: &ConversationId,
        execution: ToolExecution,
    ) -> WriteOutcome {
        {
            let mut conversations = self.conversations.write().await;
            let Some(conversation) = conversations.get_mut(conversation_id) else {
                debug!(conversation_id = %conversation_id, "Dropping tool execution for unknown conversation");
                return WriteOutcome::Dropped;
            };
            conversation.record_execution(execution.clone());
        }

        match self.active_durable() {
            Some(durable) => {
                let result = durable.append_tool_execution(conversation_id, &execution).await;
                self.settle(durable.as_ref(), "append_tool_execution", result)
            }
            None => WriteOutcome::PrimaryOnly,
        }
    }

    /// The last `limit` messages, oldest first. Empty for unknown ids.
    pub async fn read_recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Vec<Message> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .map(|c| c.recent(limit).to_vec())
            .unwrap_or_default()
    }

    /// A snapshot of a whole conversation.
    pub async fn conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    pub async fn tool_executions(&self, conversation_id: &ConversationId) -> Vec<ToolExecution> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .map(|c| c.tool_executions.clone())
            .unwrap_or_default()
    }

    fn active_durable(&self) -> Option<Arc<dyn DurableStore>> {
        if self.is_durable_available() {
            self.durable.clone()
        } else {
            None
        }
    }

    fn settle(
        &self,
        durable: &dyn DurableStore,
        operation: &str,
        result: Result<(), StoreError>,
    ) -> WriteOutcome {
        match result {
            Ok(()) => WriteOutcome::Mirrored,
            Err(e) => {
                // Only the first failure is reported; the flag never flips back.
                if self.durable_available.swap(false, Ordering::SeqCst) {
                    warn!(
                        backend = durable.name(),
                        operation,
                        error = %e,
                        "Durable tier failed; continuing in memory only"
                    );
                    if let Some(bus) = &self.event_bus {
                        bus.publish(DomainEvent::DurableTierDisabled {
                            backend: durable.name().to_string(),
                            reason: e.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }
                WriteOutcome::PrimaryOnly
            }
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
