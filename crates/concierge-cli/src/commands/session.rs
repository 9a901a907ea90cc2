//! /session command - show session info

use super::CommandResult;
use concierge_agent::{Role, Session, SessionState};
use concierge_ai::Model;

pub struct SessionCommand;

impl SessionCommand {
    pub fn execute(session: &Session, model: &Model) -> CommandResult {
        let conversation = session.conversation();
        let count = |role: Role| {
            conversation
                .turns()
                .iter()
                .filter(|t| t.role() == role)
                .count()
        };
        let errors = conversation.turns().iter().filter(|t| t.is_error()).count();

        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!("Session:    {}\n", session.id()));
        output.push_str(&format!(
            "Model:      {} ({})\n",
            model.id,
            model.provider.name()
        ));
        output.push_str(&format!(
            "State:      {}\n",
            match session.state() {
                SessionState::Idle => "idle",
                SessionState::AwaitingReply => "awaiting reply",
            }
        ));
        output.push_str(&format!("Turns:      {} total\n", conversation.len()));
        output.push_str(&format!(
            "            {} user, {} assistant, {} failed",
            count(Role::User),
            count(Role::Assistant),
            errors
        ));
        CommandResult::Message(output)
    }
}
