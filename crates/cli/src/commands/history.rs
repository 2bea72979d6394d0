//! `codewright history`: Browse conversations in the durable store.

use std::path::Path;

use codewright_core::conversation::ConversationId;
use codewright_core::message::Role;
use codewright_core::store::DurableStore;
use codewright_store::SqliteStore;

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    conversation: Option<String>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let path = config.storage.database_path();
    if !path.exists() {
        println!("  No saved conversations ({} does not exist).", path.display());
        return Ok(());
    }

    let store = SqliteStore::open_file(&path)
        .await
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;

    match conversation {
        Some(id) => show_conversation(&store, &ConversationId(id), limit).await?,
        None => list_conversations(&store, limit).await?,
    }
    Ok(())
}

async fn list_conversations(store: &SqliteStore, limit: usize) -> codewright_core::Result<()> {
    let conversations = store.list_conversations(limit).await?;
    if conversations.is_empty() {
        println!("  No saved conversations.");
        return Ok(());
    }

    println!();
    for summary in conversations {
        println!(
            "  {}  {:>4} msgs  {}  {}",
            summary.id,
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            summary.title.as_deref().unwrap_or("")
        );
    }
    println!();
    Ok(())
}

async fn show_conversation(
    store: &SqliteStore,
    id: &ConversationId,
    limit: usize,
) -> codewright_core::Result<()> {
    let messages = store.load_messages(id).await?;
    if messages.is_empty() {
        println!("  Conversation {id} has no messages.");
        return Ok(());
    }

    let start = messages.len().saturating_sub(limit);
    println!();
    for message in &messages[start..] {
        let label = match message.role() {
            Role::Tool => format!("tool:{}", message.tool_call_id().unwrap_or("?")),
            role => role.as_str().to_string(),
        };
        println!("  [{label}] {}", message.content());
        for call in message.tool_calls() {
            println!("    -> {}({})", call.name, call.arguments);
        }
    }
    println!();
    Ok(())
}
