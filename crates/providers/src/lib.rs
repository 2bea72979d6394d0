//! Model gateway implementations for Codewright.
//!
//! All gateways implement the `codewright_core::ModelGateway` trait.
//! [`build_from_config`] selects the endpoint based on configuration.

pub mod openai_compat;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use codewright_config::AppConfig;
use codewright_core::error::GatewayError;
use codewright_core::gateway::ModelGateway;

pub use openai_compat::OpenAiCompatGateway;
pub use prompt::system_prompt;

/// Build the configured gateway.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    let base_url = match &config.api_url {
        Some(url) => url.clone(),
        None => default_base_url(&config.provider).ok_or_else(|| {
            GatewayError::NotConfigured(format!(
                "unknown provider '{}' (set api_url to use a custom endpoint)",
                config.provider
            ))
        })?,
    };

    let api_key = config.api_key.clone().unwrap_or_default();
    let gateway = OpenAiCompatGateway::new(&config.provider, base_url, api_key)?
        .with_timeout(Duration::from_secs(config.request_timeout_secs))?;
    Ok(Arc::new(gateway))
}

/// Get the default base URL for well-known backends.
pub fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
