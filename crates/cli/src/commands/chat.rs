//! `codewright chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use codewright_agent::TurnEngine;
use codewright_core::conversation::ConversationId;
use codewright_core::event::EventBus;
use codewright_tools::ToolRegistry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::repl::{self, ReplCommand};
use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config)?;

    let gateway = codewright_providers::build_from_config(&config)
        .map_err(|e| format!("Failed to build model gateway: {e}"))?;

    let cwd = std::env::current_dir()?;
    let working_dir = cwd.display().to_string();

    let registry = runtime::build_registry(&config, &cwd);
    for (provider, error) in registry.connect_all().await {
        eprintln!("  [Warning] tool provider '{provider}' unavailable: {error}");
    }
    let registry = Arc::new(registry);

    let event_bus = Arc::new(EventBus::default());
    let store = Arc::new(runtime::build_store(&config, event_bus.clone()).await);

    let engine = TurnEngine::new(gateway, registry.clone(), store.clone(), event_bus.clone())
        .with_model(&config.model)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_config(config.agent.to_agent_config());

    let renderer = spawn_event_renderer(&event_bus);
    let owner = config.agent.owner_id.clone();

    let result = if let Some(text) = message {
        let conversation = store.create_conversation(&owner, None).await;
        single_message(&engine, &conversation.id, &text, &working_dir).await
    } else {
        println!();
        println!("  ╔══════════════════════════════════════════════╗");
        println!("  ║        Codewright — Interactive Mode         ║");
        println!("  ╚══════════════════════════════════════════════╝");
        println!();
        println!("  Provider:  {}", config.provider);
        println!("  Model:     {}", config.model);
        println!("  Tools:     {}", registry.list_all_tools().await.len());
        println!(
            "  History:   {}",
            if store.is_durable_available() {
                config.storage.database_path().display().to_string()
            } else {
                "memory only".to_string()
            }
        );
        println!();
        println!("  Type your message and press Enter. /help for commands.");
        println!();
        interactive(&engine, &owner, &working_dir).await
    };

    let report = registry
        .disconnect_all(runtime::shutdown_timeout(&config))
        .await;
    info!(
        disconnected = report.disconnected.len(),
        failed = report.failed.len(),
        timed_out = report.timed_out.len(),
        "Tool providers shut down"
    );
    renderer.abort();

    result
}

async fn single_message(
    engine: &TurnEngine,
    conversation_id: &ConversationId,
    text: &str,
    working_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::select! {
        state = engine.process_user_input(conversation_id, text, working_dir) => {
            if let Some(reply) = state.last_message() {
                println!("{}", reply.content());
            }
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            eprintln!("  Interrupted.");
            Ok(())
        }
    }
}

async fn interactive(
    engine: &TurnEngine,
    owner: &str,
    working_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut conversation = engine.store().create_conversation(owner, None).await.id;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::Tools => print_tools(engine.tools()).await,
            ReplCommand::New => {
                conversation = engine.store().create_conversation(owner, None).await.id;
                println!("  Started conversation {conversation}");
            }
            ReplCommand::Message(text) => {
                tokio::select! {
                    state = engine.process_user_input(&conversation, &text, working_dir) => {
                        repl::print_reply(state.last_message());
                    }
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!();
                        eprintln!("  Interrupted.");
                        break;
                    }
                }
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn print_tools(registry: &ToolRegistry) {
    let tools = registry.list_all_tools().await;
    if tools.is_empty() {
        println!("  No tools available.");
        return;
    }
    for tool in tools {
        println!("  {:<24} {}", tool.name, tool.description);
    }
}

fn spawn_event_renderer(event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = repl::render_event(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event renderer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
