//! # Codewright Core
//!
//! Domain types, traits, and error definitions for the Codewright coding assistant.
//! This crate performs **no I/O**: it defines the domain model that the
//! gateway, tool, store, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here:
//! - [`ModelGateway`]: The language-model backend
//! - [`ToolProvider`]: An external provider exposing named tools
//! - [`DurableStore`]: The best-effort secondary conversation tier
//!
//! Implementations live in their respective crates, so tests can swap in
//! fakes without touching the turn engine.

pub mod error;
pub mod message;
pub mod gateway;
pub mod tool;
pub mod conversation;
pub mod store;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role, ToolCall};
pub use gateway::{
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, GatewayRequest, GatewayResponse, ModelGateway, Usage,
};
pub use tool::{Tool, ToolDescriptor, ToolProvider};
pub use conversation::{Conversation, ConversationId, ToolExecution, ToolStatus};
pub use store::{ConversationSummary, DurableStore};
pub use agent::{AgentConfig, AgentState, StateUpdate};
pub use event::{DomainEvent, EventBus};
