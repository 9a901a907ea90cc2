//! Slash commands for interactive mode

mod customer;
mod session;

pub use customer::{CustomerCommand, RegisterCommand};
pub use session::SessionCommand;

use concierge_agent::{CustomerDirectory, Session};
use concierge_ai::Model;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Drop the conversation and start a fresh session
    NewSession,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// What commands may look at
pub struct CommandContext<'a> {
    pub directory: &'a dyn CustomerDirectory,
    pub session: &'a Session,
    pub model: &'a Model,
}

/// Parse and execute a slash command. Returns `None` for ordinary input.
pub async fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "customer" | "c" => CustomerCommand::execute(args, ctx.directory).await,

        "register" | "r" => RegisterCommand::execute(args, ctx.directory).await,

        "session" | "s" => SessionCommand::execute(ctx.session, ctx.model),

        "new" | "clear" => CommandResult::NewSession,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?               Show this help message
  /customer, /c <name>        Look up a customer by name
  /register, /r <name> <email>
                              Register a new customer
  /session, /s                Show session info
  /new, /clear                Start a fresh conversation
  /quit, /exit, /q            Exit concierge

Anything else you type is sent to the assistant.

Examples:
  /customer john              Finds "John Smith"
  /register Jane Doe jane@example.com"#
        .to_string()
}
