//! Conversation persistence for Codewright.
//!
//! [`ConversationStore`] is the authoritative in-process tier; a
//! [`DurableStore`](codewright_core::DurableStore) such as [`SqliteStore`]
//! mirrors its writes on a best-effort basis.

pub mod conversation_store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use conversation_store::{ConversationStore, WriteOutcome};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
