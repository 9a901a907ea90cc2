//! Session event types

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationTurn;

/// Events emitted while a session processes submissions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A turn was appended to the conversation
    TurnAppended { index: usize, turn: ConversationTurn },

    /// Generation started for the latest user turn
    ReplyStart,

    /// A fragment of the reply arrived
    ReplyDelta { delta: String },

    /// Generation finished with the complete reply
    ReplyEnd { text: String },

    /// Generation failed
    Error { message: String },
}

impl SessionEvent {
    /// Check if this event ends a generation
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::ReplyEnd { .. } | SessionEvent::Error { .. })
    }
}
