//! End-to-end integration tests for the Codewright turn pipeline.
//!
//! These tests wire a scripted model gateway to the real tool registry,
//! built-in filesystem tools, and the two-tier conversation store backed by
//! an in-memory SQLite database.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codewright_agent::TurnEngine;
use codewright_core::conversation::ToolStatus;
use codewright_core::error::GatewayError;
use codewright_core::event::{DomainEvent, EventBus};
use codewright_core::gateway::{GatewayRequest, GatewayResponse, ModelGateway};
use codewright_core::message::{Message, Role, ToolCall};
use codewright_core::store::DurableStore;
use codewright_store::{ConversationStore, SqliteStore};
use codewright_tools::{BuiltinToolProvider, ToolRegistry};

// ── Scripted gateway ─────────────────────────────────────────────────────

/// A gateway that returns scripted responses in sequence.
struct ScriptedGateway {
    responses: Mutex<VecDeque<GatewayResponse>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    fn new(responses: Vec<GatewayResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> GatewayRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        next.ok_or_else(|| GatewayError::ApiError {
            status_code: 500,
            message: "script exhausted".into(),
        })
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> GatewayResponse {
    GatewayResponse::tool_calls(vec![ToolCall::new(id, name, arguments.to_string())])
}

struct Harness {
    engine: TurnEngine,
    gateway: Arc<ScriptedGateway>,
    sqlite: Arc<SqliteStore>,
    event_bus: Arc<EventBus>,
}

async fn harness(working_dir: &Path, responses: Vec<GatewayResponse>) -> Harness {
    let gateway = Arc::new(ScriptedGateway::new(responses));

    let mut registry = ToolRegistry::new();
    registry.register_provider(
        BuiltinToolProvider::NAME,
        Arc::new(BuiltinToolProvider::new(working_dir)),
    );
    assert!(registry.connect_all().await.is_empty());

    let sqlite = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let event_bus = Arc::new(EventBus::default());
    let store = ConversationStore::with_durable(sqlite.clone()).with_event_bus(event_bus.clone());

    let engine = TurnEngine::new(
        gateway.clone(),
        Arc::new(registry),
        Arc::new(store),
        event_bus.clone(),
    )
    .with_model("e2e-model");

    Harness {
        engine,
        gateway,
        sqlite,
        event_bus,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_read_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();

    let h = harness(
        dir.path(),
        vec![
            call("call_1", "read_file", serde_json::json!({"path": "notes.txt"})),
            GatewayResponse::text("The note says to remember the milk."),
        ],
    )
    .await;

    let conversation = h.engine.store().create_conversation("e2e", None).await;
    let wd = dir.path().display().to_string();
    let state = h
        .engine
        .process_user_input(&conversation.id, "what's in notes.txt?", &wd)
        .await;

    let roles: Vec<Role> = state.messages.iter().map(Message::role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(state.messages[2].content(), "remember the milk");
    assert_eq!(state.messages[2].tool_call_id(), Some("call_1"));
    assert_eq!(
        state.last_message().unwrap().content(),
        "The note says to remember the milk."
    );

    // The model saw the tool result on its second call, plus the tool catalog
    assert_eq!(h.gateway.calls(), 2);
    let second = h.gateway.last_request();
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.working_directory, wd);
    let names: Vec<&str> = second.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["list_directory", "read_file", "write_file"]);
}

#[tokio::test]
async fn e2e_durable_tier_mirrors_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

    let h = harness(
        dir.path(),
        vec![
            call("call_ls", "list_directory", serde_json::json!({})),
            GatewayResponse::text("There is a Cargo.toml and a src directory."),
        ],
    )
    .await;

    let conversation = h.engine.store().create_conversation("e2e", None).await;
    let state = h
        .engine
        .process_user_input(&conversation.id, "list files", &dir.path().display().to_string())
        .await;

    assert!(h.engine.store().is_durable_available());

    let persisted = h.sqlite.load_messages(&conversation.id).await.unwrap();
    assert_eq!(persisted.len(), state.messages.len());
    for (stored, produced) in persisted.iter().zip(&state.messages) {
        assert_eq!(stored.role(), produced.role());
        assert_eq!(stored.content(), produced.content());
    }
    let listing: Vec<String> = serde_json::from_str(persisted[2].content()).unwrap();
    assert_eq!(listing, vec!["Cargo.toml".to_string(), "src/".to_string()]);

    let executions = h.engine.store().tool_executions(&conversation.id).await;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].tool_name, "list_directory");
    assert_eq!(executions[0].status, ToolStatus::Completed);

    let summaries = h.sqlite.list_conversations(10).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].message_count, 4);
}

#[tokio::test]
async fn e2e_write_file_creates_file() {
    let dir = tempfile::tempdir().unwrap();

    let h = harness(
        dir.path(),
        vec![
            call(
                "call_w",
                "write_file",
                serde_json::json!({"path": "out/hello.txt", "content": "hello"}),
            ),
            GatewayResponse::text("Done."),
        ],
    )
    .await;

    let mut events = h.event_bus.subscribe();
    let conversation = h.engine.store().create_conversation("e2e", None).await;
    let state = h
        .engine
        .process_user_input(&conversation.id, "write hello", &dir.path().display().to_string())
        .await;

    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/hello.txt")).unwrap(),
        "hello"
    );
    assert_eq!(state.last_message().unwrap().content(), "Done.");

    let mut saw_tool_success = false;
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::ToolExecuted {
            tool_name, success, ..
        } = event.as_ref()
        {
            assert_eq!(tool_name, "write_file");
            saw_tool_success = *success;
        }
    }
    assert!(saw_tool_success);
}

#[tokio::test]
async fn e2e_failed_tool_does_not_end_the_turn() {
    let dir = tempfile::tempdir().unwrap();

    let h = harness(
        dir.path(),
        vec![
            call("call_r", "read_file", serde_json::json!({"path": "missing.txt"})),
            GatewayResponse::text("That file does not exist."),
        ],
    )
    .await;

    let conversation = h.engine.store().create_conversation("e2e", None).await;
    let state = h
        .engine
        .process_user_input(&conversation.id, "read missing.txt", &dir.path().display().to_string())
        .await;

    assert_eq!(state.messages.len(), 4);
    assert!(matches!(
        &state.messages[2],
        Message::Tool { is_error: true, .. }
    ));
    assert_eq!(
        state.last_message().unwrap().content(),
        "That file does not exist."
    );

    let executions = h.engine.store().tool_executions(&conversation.id).await;
    assert_eq!(executions[0].status, ToolStatus::Failed);
}

#[tokio::test]
async fn e2e_second_turn_replays_history() {
    let dir = tempfile::tempdir().unwrap();

    let h = harness(
        dir.path(),
        vec![
            GatewayResponse::text("Hi! What are we building?"),
            GatewayResponse::text("A CLI, got it."),
        ],
    )
    .await;

    let conversation = h.engine.store().create_conversation("e2e", None).await;
    let wd = dir.path().display().to_string();
    h.engine
        .process_user_input(&conversation.id, "hello", &wd)
        .await;
    let state = h
        .engine
        .process_user_input(&conversation.id, "a CLI", &wd)
        .await;

    assert_eq!(state.messages.len(), 4);
    assert_eq!(h.gateway.last_request().messages.len(), 3);
    assert_eq!(
        h.sqlite.load_messages(&conversation.id).await.unwrap().len(),
        4
    );
}

#[tokio::test]
async fn e2e_registry_teardown_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), vec![]).await;

    let first = h.engine.tools().disconnect_all(Duration::from_secs(1)).await;
    assert_eq!(first.disconnected, vec!["builtin".to_string()]);

    let second = h.engine.tools().disconnect_all(Duration::from_secs(1)).await;
    assert!(second.failed.is_empty());
    assert!(second.timed_out.is_empty());
}
