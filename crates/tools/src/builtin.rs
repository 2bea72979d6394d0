//! The built-in tool provider: in-process filesystem tools.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use codewright_core::error::ToolError;
use codewright_core::tool::{Tool, ToolDescriptor, ToolProvider};
use tracing::debug;

use crate::file_read::ReadFileTool;
use crate::file_write::WriteFileTool;
use crate::list_directory::ListDirectoryTool;

/// Resolve `path` against `root` unless it is already absolute.
pub(crate) fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

/// A [`ToolProvider`] over a fixed set of in-process [`Tool`]s.
pub struct BuiltinToolProvider {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
    connected: AtomicBool,
}

impl BuiltinToolProvider {
    /// The provider name used for registration.
    pub const NAME: &'static str = "builtin";

    /// The filesystem tools, rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let root = working_dir.into();
        Self::with_tools(vec![
            Box::new(ListDirectoryTool::new(root.clone())),
            Box::new(ReadFileTool::new(root.clone())),
            Box::new(WriteFileTool::new(root)),
        ])
    }

    /// A provider over arbitrary tools. Later tools with a duplicate name are ignored.
    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        let mut index = HashMap::new();
        for (i, tool) in tools.iter().enumerate() {
            index.entry(tool.name().to_string()).or_insert(i);
        }
        Self {
            tools,
            index,
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ToolProvider for BuiltinToolProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn connect(&self) -> Result<(), ToolError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ToolError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(provider = Self::NAME, "Disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if !self.is_connected() {
            return Err(ToolError::NotConnected {
                provider: Self::NAME.into(),
            });
        }
        Ok(self
            .tools
            .iter()
            .enumerate()
            .filter(|(i, tool)| self.index.get(tool.name()) == Some(i))
            .map(|(_, tool)| tool.to_descriptor())
            .collect())
    }

    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        if !self.is_connected() {
            return Err(ToolError::NotConnected {
                provider: Self::NAME.into(),
            });
        }
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_and_absolute() {
        let root = Path::new("/work");
        assert_eq!(resolve_path(root, "src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(resolve_path(root, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[tokio::test]
    async fn lists_tools_in_declaration_order() {
        let provider = BuiltinToolProvider::new("/");
        provider.connect().await.unwrap();
        let names: Vec<String> = provider
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["list_directory", "read_file", "write_file"]);
    }

    #[tokio::test]
    async fn requires_connection() {
        let provider = BuiltinToolProvider::new("/");
        assert!(!provider.is_connected());
        assert!(matches!(
            provider.list_tools().await,
            Err(ToolError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let provider = BuiltinToolProvider::new("/");
        provider.connect().await.unwrap();
        provider.disconnect().await.unwrap();
        provider.disconnect().await.unwrap();
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn executes_against_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();

        let provider = BuiltinToolProvider::new(dir.path());
        provider.connect().await.unwrap();
        let out = provider
            .execute("read_file", serde_json::json!({ "path": "a.txt" }))
            .await
            .unwrap();
        assert_eq!(out, "alpha");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let provider = BuiltinToolProvider::new("/");
        provider.connect().await.unwrap();
        let err = provider
            .execute("rm_rf", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "rm_rf"));
    }
}
