//! Directory listing tool.

use std::path::PathBuf;

use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::Tool;

use crate::builtin::resolve_path;

pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, sorted by name. Subdirectories end with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list (defaults to the working directory)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let full = resolve_path(&self.root, path);

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "list_directory".into(),
            reason: format!("Failed to list {}: {e}", full.display()),
        };

        let mut reader = tokio::fs::read_dir(&full).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(failed)? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        Ok(serde_json::json!(entries))
    }
}
