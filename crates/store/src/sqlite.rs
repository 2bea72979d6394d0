//! SQLite durable tier.
//!
//! Three tables:
//! - `conversations`: One row per conversation; `state` is a JSON snapshot
//!   (message count, tool-execution count, last role) refreshed on every write
//! - `messages`: The ordered message log; `metadata` holds the full message JSON
//! - `tool_executions`: Finalized tool-execution records
//!
//! Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use codewright_core::conversation::{Conversation, ConversationId, ToolExecution};
use codewright_core::error::StoreError;
use codewright_core::message::Message;
use codewright_core::store::{ConversationSummary, DurableStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("{column} {s:?}: {e}")))
}

fn query_failed(context: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::QueryFailed(format!("{context}: {e}"))
}

/// A SQLite-backed [`DurableStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database, useful for tests.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to an in-memory database is a separate database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite conversation store initialized at {path}");
        Ok(store)
    }

    /// Open the database file at `path`, creating parent directories.
    pub async fn open_file(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          TEXT PRIMARY KEY NOT NULL,
                owner_id    TEXT NOT NULL,
                title       TEXT,
                state       TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                seq             INTEGER NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                metadata        TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                UNIQUE (conversation_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tool_executions (
                id              TEXT PRIMARY KEY NOT NULL,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                tool_call_id    TEXT NOT NULL,
                tool_name       TEXT NOT NULL,
                input           TEXT NOT NULL,
                output          TEXT,
                status          TEXT NOT NULL,
                started_at      TEXT NOT NULL,
                finished_at     TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tool_executions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tool_executions_conversation ON tool_executions(conversation_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("tool_executions index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Bump `updated_at` and recompute the `state` snapshot.
    async fn touch(&self, conversation_id: &ConversationId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE conversations SET
                updated_at = ?1,
                state = json_object(
                    'messages',
                    (SELECT COUNT(*) FROM messages WHERE conversation_id = ?2),
                    'tool_executions',
                    (SELECT COUNT(*) FROM tool_executions WHERE conversation_id = ?2),
                    'last_role',
                    (SELECT role FROM messages WHERE conversation_id = ?2 ORDER BY seq DESC LIMIT 1)
                )
            WHERE id = ?2
            "#,
        )
        .bind(timestamp(&Utc::now()))
        .bind(conversation_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed("touch conversation"))?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let state = serde_json::json!({
            "messages": conversation.messages.len(),
            "tool_executions": conversation.tool_executions.len(),
            "last_role": conversation.messages.last().map(|m| m.role().as_str()),
        });

        sqlx::query(
            r#"
            INSERT INTO conversations (id, owner_id, title, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(conversation.id.as_str())
        .bind(&conversation.owner_id)
        .bind(&conversation.title)
        .bind(state.to_string())
        .bind(timestamp(&conversation.created_at))
        .bind(timestamp(&conversation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(query_failed("insert conversation"))?;
        Ok(())
    }

    async fn append_messages(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("begin transaction"))?;

        let next: i64 = sqlx::query(
            "SELECT COALESCE(MAX(seq), -1) + 1 AS next FROM messages WHERE conversation_id = ?1",
        )
        .bind(conversation_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(query_failed("next sequence"))?
        .try_get("next")
        .map_err(query_failed("next column"))?;

        for (offset, message) in messages.iter().enumerate() {
            let metadata = serde_json::to_string(message)
                .map_err(|e| StoreError::Storage(format!("serialize message: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO messages (conversation_id, seq, role, content, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(conversation_id.as_str())
            .bind(next + offset as i64)
            .bind(message.role().as_str())
            .bind(message.content())
            .bind(metadata)
            .bind(timestamp(&message.timestamp()))
            .execute(&mut *tx)
            .await
            .map_err(query_failed("insert message"))?;
        }

        tx.commit().await.map_err(query_failed("commit"))?;
        self.touch(conversation_id).await
    }

    async fn append_tool_execution(
        &self,
        conversation_id: &ConversationId,
        execution: &ToolExecution,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tool_executions
                (id, conversation_id, tool_call_id, tool_name, input, output, status, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&execution.id)
        .bind(conversation_id.as_str())
        .bind(&execution.tool_call_id)
        .bind(&execution.tool_name)
        .bind(execution.input.to_string())
        .bind(execution.output.as_ref().map(|o| o.to_string()))
        .bind(execution.status.as_str())
        .bind(timestamp(&execution.started_at))
        .bind(execution.finished_at.as_ref().map(timestamp))
        .execute(&self.pool)
        .await
        .map_err(query_failed("insert tool execution"))?;

        self.touch(conversation_id).await
    }

    async fn load_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query("SELECT metadata FROM messages WHERE conversation_id = ?1 ORDER BY seq")
            .bind(conversation_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("load messages"))?;

        rows.iter()
            .map(|row| {
                let metadata: String = row.try_get("metadata").map_err(query_failed("metadata column"))?;
                serde_json::from_str(&metadata)
                    .map_err(|e| StoreError::QueryFailed(format!("decode message: {e}")))
            })
            .collect()
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.owner_id, c.title, c.created_at, c.updated_at,
                   COUNT(m.iid) AS message_count
            FROM conversations c
            LEFT JOIN messages m ON m.conversation_id = c.id
            GROUP BY c.id
            ORDER BY c.updated_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list conversations"))?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(query_failed("id column"))?;
                let count: i64 = row.try_get("message_count").map_err(query_failed("message_count column"))?;
                let created_at: String = row.try_get("created_at").map_err(query_failed("created_at column"))?;
                let updated_at: String = row.try_get("updated_at").map_err(query_failed("updated_at column"))?;
                Ok(ConversationSummary {
                    id: ConversationId(id),
                    owner_id: row.try_get("owner_id").map_err(query_failed("owner_id column"))?,
                    title: row.try_get("title").map_err(query_failed("title column"))?,
                    message_count: count.max(0) as usize,
                    created_at: parse_timestamp("created_at", &created_at)?,
                    updated_at: parse_timestamp("updated_at", &updated_at)?,
                })
            })
            .collect()
    }
}
