//! File read tool: read file contents relative to the working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::Tool;

use crate::builtin::resolve_path;

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    /// Create a read tool resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Relative paths resolve against the working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let full = resolve_path(&self.root, path);
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to read {}: {e}", full.display()),
            })?;

        Ok(serde_json::Value::String(content))
    }
}
