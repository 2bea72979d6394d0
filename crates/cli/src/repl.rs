//! REPL input parsing and terminal rendering.

use codewright_core::event::DomainEvent;
use codewright_core::message::Message;

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Tools,
    New,
    Exit,
    Empty,
    /// Anything else is a user turn.
    Message(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/help" | "/?" => Self::Help,
            "/tools" => Self::Tools,
            "/new" => Self::New,
            "/exit" | "/quit" | "exit" | "quit" => Self::Exit,
            text => Self::Message(text.to_string()),
        }
    }
}

pub const HELP: &str = "\
  Commands:
    /help    Show this help
    /tools   List available tools
    /new     Start a new conversation
    /exit    Quit (Ctrl+C also works)

  Anything else is sent to the assistant.";

/// A one-line description of tool activity, or `None` for events the REPL ignores.
pub fn render_event(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::ToolStarted { tool_name, .. } => Some(format!("  ⚙ {tool_name} ...")),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => Some(if *success {
            format!("  ✓ {tool_name} ({duration_ms} ms)")
        } else {
            format!("  ✗ {tool_name} failed ({duration_ms} ms)")
        }),
        DomainEvent::RoundLimitReached { rounds, .. } => {
            Some(format!("  ! stopped after {rounds} tool rounds"))
        }
        DomainEvent::DurableTierDisabled { reason, .. } => {
            Some(format!("  ! history will not be saved to disk: {reason}"))
        }
        _ => None,
    }
}

/// Print an assistant reply with a visible prefix on every line.
pub fn print_reply(message: Option<&Message>) {
    let Some(message) = message else {
        return;
    };
    println!();
    for line in message.content().lines() {
        println!("  Assistant > {line}");
    }
    println!();
}
