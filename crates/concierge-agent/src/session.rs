//! Session state machine.
//!
//! A session moves `Idle -> AwaitingReply -> Idle` for every accepted
//! submission:
//!
//! 1. the pending input is taken (the buffer is left empty) and appended as a
//!    user turn;
//! 2. the prompt is composed from the grounding context and the query;
//! 3. the generator is awaited and its reply appended as an assistant turn.
//!
//! Blank submissions are ignored and leave the buffer untouched. Only one
//! submission can be in flight per session; a second one is refused with
//! [`Error::Busy`] without touching the conversation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    conversation::{Conversation, ConversationTurn},
    error::{Error, Result},
    events::SessionEvent,
    generator::ResponseGenerator,
    handle::SessionHandle,
    prompt::PromptComposer,
};

/// Text of the assistant turn recorded when generation fails
pub const ERROR_TURN_TEXT: &str =
    "Something went wrong while generating a reply. Please try again.";

/// What to record when the model fails to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Append a designated error turn after the user turn
    #[default]
    AppendErrorTurn,
    /// Leave the user turn without a reply
    LeaveDangling,
}

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub failure_policy: FailurePolicy,
}

/// Where a session is in its submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingReply,
}

/// Result of a submission that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The input was blank; nothing happened
    Ignored,
    /// The reply turn that was appended
    Replied(ConversationTurn),
}

/// Text typed but not yet submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInputBuffer {
    text: String,
}

impl PendingInputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Take the contents, leaving the buffer empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// Builds independent sessions that share the knowledge base and generator
#[derive(Clone)]
pub struct SessionFactory {
    composer: PromptComposer,
    generator: ResponseGenerator,
    config: SessionConfig,
}

impl SessionFactory {
    pub fn new(composer: PromptComposer, generator: ResponseGenerator, config: SessionConfig) -> Self {
        Self {
            composer,
            generator,
            config,
        }
    }

    /// Start a fresh session with an empty conversation
    pub fn create(&self) -> Session {
        Session::new(
            self.composer.clone(),
            self.generator.clone(),
            self.config.clone(),
        )
    }
}

/// One user's conversation with the assistant
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    composer: PromptComposer,
    generator: ResponseGenerator,
    conversation: Mutex<Conversation>,
    input: Mutex<PendingInputBuffer>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
}

impl Session {
    pub fn new(composer: PromptComposer, generator: ResponseGenerator, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let id = Uuid::new_v4();
        debug!(session = %id, "session created");
        Self {
            id,
            config,
            composer,
            generator,
            conversation: Mutex::new(Conversation::new()),
            input: Mutex::new(PendingInputBuffer::new()),
            event_tx,
            handle: SessionHandle::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        if self.handle.is_busy() {
            SessionState::AwaitingReply
        } else {
            SessionState::Idle
        }
    }

    /// Snapshot of the conversation so far
    pub fn conversation(&self) -> Conversation {
        self.conversation.lock().clone()
    }

    /// Replace the pending input
    pub fn set_input(&self, text: impl Into<String>) {
        self.input.lock().set(text);
    }

    pub fn pending_input(&self) -> String {
        self.input.lock().text().to_string()
    }

    /// Set the pending input and submit it.
    pub async fn submit_text(&self, text: impl Into<String>) -> Result<SubmitOutcome> {
        self.set_input(text);
        self.submit().await
    }

    /// Submit the pending input.
    ///
    /// On generation failure the error is returned after the conversation
    /// has been settled according to the failure policy; the session is
    /// idle again either way.
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        let (query, _busy) = {
            let mut input = self.input.lock();
            if input.is_blank() {
                debug!(session = %self.id, "ignoring empty submission");
                return Ok(SubmitOutcome::Ignored);
            }
            let Some(busy) = self.handle.try_begin() else {
                debug!(session = %self.id, "refusing submission while a reply is pending");
                return Err(Error::Busy);
            };
            (input.take(), busy)
        };

        self.append(ConversationTurn::user(query.as_str()));
        self.emit(SessionEvent::ReplyStart);

        let prompt = self.composer.compose(&query);
        debug!(session = %self.id, prompt_len = prompt.len(), "generating reply");

        let event_tx = self.event_tx.clone();
        let result = self
            .generator
            .generate_with(&prompt, |delta| {
                let _ = event_tx.send(SessionEvent::ReplyDelta {
                    delta: delta.to_string(),
                });
            })
            .await;

        match result {
            Ok(reply) => {
                self.emit(SessionEvent::ReplyEnd {
                    text: reply.clone(),
                });
                let turn = ConversationTurn::assistant(reply);
                self.append(turn.clone());
                Ok(SubmitOutcome::Replied(turn))
            }
            Err(e) => {
                warn!(session = %self.id, "reply generation failed: {}", e);
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                if self.config.failure_policy == FailurePolicy::AppendErrorTurn {
                    self.append(ConversationTurn::error(ERROR_TURN_TEXT));
                }
                Err(e)
            }
        }
    }

    fn append(&self, turn: ConversationTurn) {
        let index = {
            let mut conversation = self.conversation.lock();
            conversation.append(turn.clone());
            conversation.len() - 1
        };
        self.emit(SessionEvent::TurnAppended { index, turn });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}
