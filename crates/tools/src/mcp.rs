//! MCP tool provider over a child process's stdio.
//!
//! Protocol:
//! 1. Spawn the server command with piped stdin/stdout (`TokioChildProcess`).
//! 2. `serve_client(init_params, transport)` runs the `initialize` handshake,
//!    bounded by the connect timeout.
//! 3. `tools/list` and `tools/call` go through the running service.
//! 4. Disconnect takes the service out of its slot and cancels it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::{ToolDescriptor, ToolProvider};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, InitializeRequestParams,
    ProtocolVersion, RawContent,
};
use rmcp::service::{RoleClient, RunningService, serve_client};
use rmcp::transport::child_process::TokioChildProcess;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type McpService = RunningService<RoleClient, InitializeRequestParams>;

fn init_params() -> InitializeRequestParams {
    InitializeRequestParams {
        meta: None,
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ClientCapabilities::default(),
        client_info: rmcp::model::Implementation::from_build_env(),
    }
}

/// A tool provider backed by one MCP server process.
pub struct McpToolProvider {
    name: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    connect_timeout: Duration,
    service: Mutex<Option<Arc<McpService>>>,
    connected: AtomicBool,
}

impl McpToolProvider {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env: BTreeMap::new(),
            connect_timeout: Duration::from_secs(30),
            service: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Extra environment variables for the server process.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Bound on spawn plus handshake.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn connection_failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ConnectionFailed {
            provider: self.name.clone(),
            reason: reason.into(),
        }
    }

    async fn running(&self) -> Result<Arc<McpService>, ToolError> {
        self.service
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ToolError::NotConnected {
                provider: self.name.clone(),
            })
    }
}

/// Fold a `tools/call` result into a JSON value.
///
/// Structured content wins when present; otherwise text blocks are joined.
fn call_result_to_value(tool_name: &str, result: CallToolResult) -> Result<serde_json::Value, ToolError> {
    let text = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: if text.is_empty() {
                "tool reported an error".into()
            } else {
                text
            },
        });
    }

    Ok(match result.structured_content {
        Some(structured) => structured,
        None => serde_json::Value::String(text),
    })
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), ToolError> {
        let mut slot = self.service.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped());

        let (transport, _stderr) = TokioChildProcess::builder(cmd)
            .spawn()
            .map_err(|e| self.connection_failed(format!("spawn {}: {e}", self.command)))?;

        let service = tokio::time::timeout(self.connect_timeout, serve_client(init_params(), transport))
            .await
            .map_err(|_| self.connection_failed("MCP handshake timeout"))?
            .map_err(|e| self.connection_failed(format!("MCP handshake: {e}")))?;

        info!(provider = %self.name, command = %self.command, "MCP server connected");
        *slot = Some(Arc::new(service));
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ToolError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        self.connected.store(false, Ordering::SeqCst);

        match Arc::try_unwrap(service) {
            Ok(service) => {
                if let Err(e) = service.cancel().await {
                    warn!(provider = %self.name, error = %e, "MCP service did not shut down cleanly");
                }
            }
            // A call is still in flight; dropping our handle cancels once it finishes.
            Err(shared) => drop(shared),
        }
        debug!(provider = %self.name, "MCP server disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let service = self.running().await?;
        let listed = service.list_tools(None).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "tools/list".into(),
            reason: e.to_string(),
        })?;

        Ok(listed
            .tools
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: serde_json::Value::Object(t.input_schema.as_ref().clone()),
            })
            .collect())
    }

    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let service = self.running().await?;
        let arguments = match arguments {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "MCP tool arguments must be an object, got {other}"
                )));
            }
        };

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: name.into(),
                reason: e.to_string(),
            })?;

        call_result_to_value(name, result)
    }
}
