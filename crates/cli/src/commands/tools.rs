//! `codewright tools`: List every tool the configured providers expose.

use std::path::Path;

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let cwd = std::env::current_dir()?;

    let registry = runtime::build_registry(&config, &cwd);
    let failures = registry.connect_all().await;

    println!();
    for name in registry.provider_names() {
        let status = if registry.is_connected(name) {
            "connected"
        } else {
            "unavailable"
        };
        println!("  [{name}] {status}");
    }
    for (provider, error) in &failures {
        println!("    {provider}: {error}");
    }
    println!();

    let tools = registry.list_all_tools().await;
    if tools.is_empty() {
        println!("  No tools available.");
    } else {
        println!("  {} tools:", tools.len());
        for tool in &tools {
            println!("    {:<24} {}", tool.name, tool.description);
        }
    }
    println!();

    registry
        .disconnect_all(runtime::shutdown_timeout(&config))
        .await;
    Ok(())
}
