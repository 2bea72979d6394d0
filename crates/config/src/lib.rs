//! Configuration loading, validation, and management for Codewright.
//!
//! Loads configuration from `~/.codewright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use codewright_core::agent::AgentConfig;
use codewright_core::gateway::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.codewright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model backend ("openrouter", "openai", "ollama", or a custom name with `api_url`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Explicit base URL for the backend (overrides the well-known default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Model request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Turn engine settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Conversation storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tool provider settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// MCP tool servers, keyed by provider name
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("agent", &self.agent)
            .field("storage", &self.storage)
            .field("tools", &self.tools)
            .field("mcp_servers", &self.mcp_servers)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum tool-dispatch rounds in a single turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Prior messages sent back to the model each turn
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Owner recorded on new conversations
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
}

fn default_max_tool_rounds() -> u32 {
    AgentConfig::default().max_tool_rounds
}
fn default_history_limit() -> usize {
    AgentConfig::default().history_limit
}
fn default_owner_id() -> String {
    "local".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            history_limit: default_history_limit(),
            owner_id: default_owner_id(),
        }
    }
}

impl AgentSettings {
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_tool_rounds: self.max_tool_rounds,
            history_limit: self.history_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Mirror conversations to the durable tier
    #[serde(default = "default_true")]
    pub durable: bool,

    /// SQLite database path; relative paths resolve against the config dir
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "conversations.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable: true,
            database: default_database(),
        }
    }
}

impl StorageConfig {
    /// Resolve the database path against the config directory.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database);
        if path.is_absolute() {
            path
        } else {
            AppConfig::config_dir().join(path)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Register the built-in filesystem tools
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Per-provider wait during shutdown before the provider is abandoned
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// MCP handshake timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a single tool call; 0 disables the limit
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_shutdown_timeout_ms() -> u64 {
    2_000
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// An MCP server spawned as a child process speaking MCP over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Executable name or path
    pub command: String,

    /// Arguments (e.g. `["-y", "@modelcontextprotocol/server-filesystem", "."]`)
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child process
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Whether this server is started
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.codewright/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CODEWRIGHT_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("CODEWRIGHT_API_KEY")
                .or_else(|| var("OPENROUTER_API_KEY"))
                .or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(provider) = var("CODEWRIGHT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = var("CODEWRIGHT_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codewright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be at least 1".into(),
            ));
        }
        if self.agent.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_limit must be at least 1".into(),
            ));
        }
        if let Some((name, _)) = self
            .mcp_servers
            .iter()
            .find(|(_, server)| server.command.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "mcp_servers.{name}.command must not be empty"
            )));
        }
        Ok(())
    }

    /// Whether the selected backend needs an API key.
    pub fn requires_api_key(&self) -> bool {
        self.provider != "ollama"
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            agent: AgentSettings::default(),
            storage: StorageConfig::default(),
            tools: ToolsConfig::default(),
            mcp_servers: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openrouter");
        assert_eq!(config.agent.max_tool_rounds, 25);
        assert!(config.storage.durable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn model_defaults_match_engine_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.tools.shutdown_timeout_ms, config.tools.shutdown_timeout_ms);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_round_limit_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_tool_rounds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_tool_rounds"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider, "openrouter");
    }

    #[test]
    fn mcp_servers_parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o"
provider = "openai"

[agent]
max_tool_rounds = 8

[mcp_servers.github]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-github"]
env = { GITHUB_TOKEN = "ghp_test" }

[mcp_servers.search]
command = "brave-search-mcp"
enabled = false
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.agent.max_tool_rounds, 8);
        assert_eq!(config.agent.history_limit, 50);
        assert_eq!(config.mcp_servers.len(), 2);
        let github = &config.mcp_servers["github"];
        assert_eq!(github.args.len(), 2);
        assert_eq!(github.env["GITHUB_TOKEN"], "ghp_test");
        assert!(!config.mcp_servers["search"].enabled);
    }

    #[test]
    fn empty_mcp_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mcp_servers.broken]\ncommand = \"  \"\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [unterminated").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "sk-or"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("CODEWRIGHT_MODEL", "gpt-4o-mini"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.provider, "openrouter");
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|k| (k == "CODEWRIGHT_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("max_tool_rounds"));
    }

    #[test]
    fn tool_call_timeout_defaults_and_parses() {
        assert_eq!(AppConfig::default().tools.call_timeout_secs, 120);
        let config: AppConfig = toml::from_str("[tools]\ncall_timeout_secs = 0\n").unwrap();
        assert_eq!(config.tools.call_timeout_secs, 0);
        assert_eq!(config.tools.connect_timeout_secs, 30);
    }
}
