//! The turn engine state machine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use codewright_core::agent::{AgentConfig, AgentState, StateUpdate};
use codewright_core::conversation::{ConversationId, ToolExecution};
use codewright_core::event::{DomainEvent, EventBus};
use codewright_core::error::GatewayError;
use codewright_core::gateway::{
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, GatewayRequest, GatewayResponse, ModelGateway,
};
use codewright_core::message::{Message, Role, ToolCall};
use codewright_store::ConversationStore;
use codewright_tools::ToolRegistry;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown to the user when the model gateway fails.
pub const GATEWAY_FAILURE_MESSAGE: &str = "Sorry, I could not process that request. Please try again.";

fn round_limit_message(rounds: u32) -> String {
    format!(
        "Stopped after reaching the tool round limit ({rounds} rounds). \
         Ask me to continue if more work is needed."
    )
}

/// Where a turn currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPhase {
    /// Entry: nothing has happened yet.
    AwaitingUserInput,
    /// Persist the incoming user message.
    RecordingInput,
    /// Ask the model for the next step.
    Modeling,
    /// Execute the tool calls the model requested, in declaration order.
    Dispatching(Vec<ToolCall>),
    /// The turn is over.
    Terminal,
}

/// Drives conversational turns against a model gateway and a tool registry.
pub struct TurnEngine {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    store: Arc<ConversationStore>,
    event_bus: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    config: AgentConfig,
}

impl TurnEngine {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        store: Arc<ConversationStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            gateway,
            tools,
            store,
            event_bus,
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            config: AgentConfig::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of tool-dispatch rounds per turn.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.config.max_tool_rounds = max;
        self
    }

    /// Set how many stored messages are replayed to the model each turn.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run one turn for a new piece of user text.
    ///
    /// Replays the last `history_limit` stored messages, then appends the
    /// user message and runs the state machine.
    pub async fn process_user_input(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        working_dir: &str,
    ) -> AgentState {
        let mut messages = self
            .store
            .read_recent_messages(conversation_id, self.config.history_limit)
            .await;
        trim_orphaned_tool_results(&mut messages);
        messages.push(Message::user(text));
        self.run(messages, conversation_id, working_dir).await
    }

    /// Run the state machine to completion.
    ///
    /// `initial_messages` is prior history plus the new user message, which
    /// is recorded on entry. The returned state holds the full sequence:
    /// the initial messages followed by everything produced this turn.
    pub async fn run(
        &self,
        initial_messages: Vec<Message>,
        conversation_id: &ConversationId,
        working_dir: &str,
    ) -> AgentState {
        let mut state = AgentState::new(conversation_id.clone(), initial_messages);
        let mut phase = TurnPhase::AwaitingUserInput;
        let mut rounds = 0u32;
        let mut seen_call_ids: HashSet<String> = state
            .messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .map(|call| call.id.clone())
            .collect();

        info!(
            conversation_id = %conversation_id,
            messages = state.messages.len(),
            "Processing turn"
        );

        loop {
            phase = match phase {
                TurnPhase::AwaitingUserInput => {
                    self.event_bus.publish(DomainEvent::TurnStarted {
                        conversation_id: conversation_id.to_string(),
                        timestamp: Utc::now(),
                    });
                    TurnPhase::RecordingInput
                }

                TurnPhase::RecordingInput => {
                    if let Some(message) = state.last_message().filter(|m| m.role() == Role::User) {
                        self.store
                            .append_messages(conversation_id, std::slice::from_ref(message))
                            .await;
                    }
                    TurnPhase::Modeling
                }

                TurnPhase::Modeling if rounds >= self.config.max_tool_rounds => {
                    warn!(
                        conversation_id = %conversation_id,
                        rounds,
                        "Tool round limit reached, ending turn"
                    );
                    self.event_bus.publish(DomainEvent::RoundLimitReached {
                        conversation_id: conversation_id.to_string(),
                        rounds,
                        timestamp: Utc::now(),
                    });
                    let notice = Message::assistant(round_limit_message(rounds));
                    self.record(&mut state, notice, false).await;
                    TurnPhase::Terminal
                }

                TurnPhase::Modeling => match self.model_step(&state, working_dir).await {
                    Ok(response) => {
                        let calls = assign_call_ids(response.tool_calls, &mut seen_call_ids);
                        debug!(
                            conversation_id = %conversation_id,
                            tool_calls = calls.len(),
                            "Model responded"
                        );
                        if calls.is_empty() {
                            self.record(&mut state, Message::assistant(response.text), false)
                                .await;
                            TurnPhase::Terminal
                        } else {
                            let message = Message::assistant_with_tools(response.text, calls.clone());
                            self.record(&mut state, message, true).await;
                            TurnPhase::Dispatching(calls)
                        }
                    }
                    Err(e) => {
                        warn!(conversation_id = %conversation_id, error = %e, "Model gateway failed");
                        self.event_bus.publish(DomainEvent::ErrorOccurred {
                            context: format!("gateway {}", self.gateway.name()),
                            error_message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        self.record(&mut state, Message::assistant(GATEWAY_FAILURE_MESSAGE), false)
                            .await;
                        TurnPhase::Terminal
                    }
                },

                TurnPhase::Dispatching(calls) => {
                    rounds += 1;
                    debug!(
                        conversation_id = %conversation_id,
                        round = rounds,
                        tool_count = calls.len(),
                        "Dispatching tool calls"
                    );
                    let update = self.dispatch(conversation_id, &calls).await;
                    state.apply(update);
                    TurnPhase::Modeling
                }

                TurnPhase::Terminal => break,
            };
        }

        state
    }

    async fn model_step(
        &self,
        state: &AgentState,
        working_dir: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        let request = GatewayRequest {
            model: self.model.clone(),
            messages: state.messages.clone(),
            tools: self.tools.list_all_tools().await,
            working_directory: working_dir.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.gateway.complete(request).await?;

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: state.conversation_id.to_string(),
            model: response.model.clone(),
            tool_calls: response.tool_calls.len(),
            tokens_used: response.usage.map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });

        Ok(response)
    }

    /// Persist one message, then fold it into the state.
    async fn record(&self, state: &mut AgentState, message: Message, should_continue: bool) {
        self.store
            .append_messages(&state.conversation_id, std::slice::from_ref(&message))
            .await;
        state.apply(StateUpdate::messages(vec![message]).with_continue(should_continue));
    }

    /// Execute every call in order. A failing call becomes an error result;
    /// its siblings still run.
    async fn dispatch(&self, conversation_id: &ConversationId, calls: &[ToolCall]) -> StateUpdate {
        let mut messages = Vec::with_capacity(calls.len());
        let mut tool_results = HashMap::with_capacity(calls.len());

        for call in calls {
            self.event_bus.publish(DomainEvent::ToolStarted {
                tool_name: call.name.clone(),
                call_id: call.id.clone(),
                timestamp: Utc::now(),
            });

            let arguments = call.parsed_arguments();
            let input = arguments
                .clone()
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
            let execution = ToolExecution::begin(conversation_id, call, input);

            let start = Instant::now();
            let result = match arguments {
                Ok(args) => self.tools.dispatch(&call.name, args).await,
                Err(e) => Err(e),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let (execution, message, payload) = match result {
                Ok(output) => {
                    let content = match &output {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (
                        execution.complete(output.clone()),
                        Message::tool_result(&call.id, &call.name, content),
                        output,
                    )
                }
                Err(e) => {
                    warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                    (
                        execution.fail(&e),
                        Message::tool_error(&call.id, &call.name, &e),
                        serde_json::json!({ "error": e.to_string() }),
                    )
                }
            };

            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                call_id: call.id.clone(),
                success: !message_is_error(&message),
                duration_ms,
                timestamp: Utc::now(),
            });

            self.store.append_tool_execution(conversation_id, execution).await;
            self.store
                .append_messages(conversation_id, std::slice::from_ref(&message))
                .await;

            tool_results.insert(call.id.clone(), payload);
            messages.push(message);
        }

        StateUpdate {
            messages,
            should_continue: Some(true),
            tool_results,
        }
    }
}

fn message_is_error(message: &Message) -> bool {
    matches!(message, Message::Tool { is_error: true, .. })
}

/// Give every call an id unique within `seen`, so each result links back to
/// exactly one call. Empty or repeated ids are replaced.
fn assign_call_ids(calls: Vec<ToolCall>, seen: &mut HashSet<String>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || seen.contains(&call.id) {
                let fresh = format!("call_{}", Uuid::new_v4().simple());
                debug!(original = %call.id, assigned = %fresh, "Reassigned tool call id");
                call.id = fresh;
            }
            seen.insert(call.id.clone());
            call
        })
        .collect()
}

/// Drop tool results at the head of a history window whose originating
/// assistant message fell outside the window.
fn trim_orphaned_tool_results(messages: &mut Vec<Message>) {
    let orphans = messages
        .iter()
        .take_while(|m| matches!(m, Message::Tool { .. }))
        .count();
    messages.drain(..orphans);
}
