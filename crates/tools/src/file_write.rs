//! File write tool: write or create files relative to the working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::Tool;

use crate::builtin::resolve_path;

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    /// Create a write tool resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn failed(&self, reason: String) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and missing parent directories if needed, \
         overwrites it if it exists."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let full = resolve_path(&self.root, path);

        if let Some(parent) = full.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(self.failed(format!("Failed to create directory: {e}")));
        }

        tokio::fs::write(&full, content)
            .await
            .map_err(|e| self.failed(format!("Failed to write {}: {e}", full.display())))?;

        Ok(serde_json::json!({
            "path": full.display().to_string(),
            "bytes_written": content.len(),
        }))
    }
}
