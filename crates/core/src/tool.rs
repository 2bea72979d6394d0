//! Tool abstractions: what gives the agent the ability to act in the world.
//!
//! Two layers:
//! - [`ToolProvider`]: an external collaborator (MCP server, built-in bundle)
//!   that exposes one or more named tools and has a connection lifecycle.
//! - [`Tool`]: a single in-process tool. The built-in provider is a bundle of these.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A tool descriptor sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// An external provider of callable tools.
///
/// `connect` and `disconnect` are each independently fallible, but
/// `disconnect` must be idempotent: tearing down an already-closed provider
/// succeeds and has no further side effects.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// The provider name (e.g., "builtin", "filesystem", "github").
    fn name(&self) -> &str;

    /// Establish the connection.
    async fn connect(&self) -> Result<(), ToolError>;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<(), ToolError>;

    /// Whether the provider is currently connected.
    fn is_connected(&self) -> bool;

    /// The provider's current tool list, in its advertised order.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    /// Execute one of this provider's tools.
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}

/// A single in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a descriptor for the model.
    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}
