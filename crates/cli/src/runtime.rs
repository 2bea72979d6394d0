//! Process wiring shared by the commands: config, tool registry, store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use codewright_config::AppConfig;
use codewright_core::event::EventBus;
use codewright_store::{ConversationStore, SqliteStore};
use codewright_tools::{BuiltinToolProvider, McpToolProvider, ToolRegistry};
use tracing::{info, warn};

/// Load the config from `path` or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Fail early with setup instructions when no API key is available.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.requires_api_key() || config.api_key.is_some() {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    CODEWRIGHT_API_KEY=...   (generic)");
    eprintln!("    OPENROUTER_API_KEY=...   (OpenRouter)");
    eprintln!("    OPENAI_API_KEY=...       (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Register the built-in provider and every enabled MCP server.
pub fn build_registry(config: &AppConfig, working_dir: &Path) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if config.tools.builtin {
        registry.register_provider(
            BuiltinToolProvider::NAME,
            Arc::new(BuiltinToolProvider::new(working_dir)),
        );
    }

    for (name, server) in config.mcp_servers.iter().filter(|(_, s)| s.enabled) {
        let provider = McpToolProvider::new(name, &server.command, server.args.clone())
            .with_env(server.env.clone())
            .with_connect_timeout(Duration::from_secs(config.tools.connect_timeout_secs));
        registry.register_provider(name, Arc::new(provider));
    }

    match config.tools.call_timeout_secs {
        0 => registry,
        secs => registry.with_call_timeout(Duration::from_secs(secs)),
    }
}

/// Build the conversation store, mirroring to SQLite when enabled.
///
/// A database that cannot be opened leaves the store in memory only.
pub async fn build_store(config: &AppConfig, event_bus: Arc<EventBus>) -> ConversationStore {
    let store = if config.storage.durable {
        let path = config.storage.database_path();
        match SqliteStore::open_file(&path).await {
            Ok(sqlite) => {
                info!(path = %path.display(), "Durable conversation store enabled");
                ConversationStore::with_durable(Arc::new(sqlite))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Durable store unavailable; using memory only");
                ConversationStore::in_memory()
            }
        }
    } else {
        ConversationStore::in_memory()
    };
    store.with_event_bus(event_bus)
}

pub fn shutdown_timeout(config: &AppConfig) -> Duration {
    Duration::from_millis(config.tools.shutdown_timeout_ms)
}
