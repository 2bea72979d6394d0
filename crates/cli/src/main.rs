//! Codewright CLI: the main entry point.
//!
//! Commands:
//! - `chat`    : Interactive REPL or single-message mode (the default)
//! - `tools`   : List the tools every configured provider exposes
//! - `history` : Browse conversations saved in the durable store
//! - `init`    : Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod repl;
mod runtime;

#[derive(Parser)]
#[command(
    name = "codewright",
    about = "Codewright — a coding assistant for your terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    message: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: ~/.codewright/config.toml)
    #[arg(long, global = true, env = "CODEWRIGHT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List available tools
    Tools,

    /// Show saved conversations, or the messages of one conversation
    History {
        /// Conversation id to print
        #[arg(short, long)]
        conversation: Option<String>,

        /// Maximum number of rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with REPL output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        None => commands::chat::run(config_path, cli.message).await?,
        Some(Commands::Chat { message }) => commands::chat::run(config_path, message.or(cli.message)).await?,
        Some(Commands::Tools) => commands::tools::run(config_path).await?,
        Some(Commands::History { conversation, limit }) => {
            commands::history::run(config_path, conversation, limit).await?
        }
        Some(Commands::Init) => commands::init::run(config_path).await?,
    }

    Ok(())
}
