//! Streaming event types and utilities

use crate::types::{AssistantMetadata, Message, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a completion streams in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Response started
    Start { model: String },
    /// Text content delta
    TextDelta { delta: String },
    /// Message completed successfully
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Error occurred
    Error { message: String },
}

impl MessageEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageEvent::Done { .. } | MessageEvent::Error { .. })
    }

    /// Get the final message if this is a Done event
    pub fn into_message(self) -> Option<Message> {
        match self {
            MessageEvent::Done { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

/// Accumulates streamed deltas into the final assistant message
#[derive(Debug, Default)]
pub struct MessageBuilder {
    text: String,
    model: Option<String>,
    usage: Usage,
    stop_reason: Option<StopReason>,
    done: bool,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event and update the message state
    pub fn process_event(&mut self, event: &MessageEvent) {
        match event {
            MessageEvent::Start { model } => {
                self.model = Some(model.clone());
            }
            MessageEvent::TextDelta { delta } => {
                self.text.push_str(delta);
            }
            MessageEvent::Done {
                message,
                stop_reason,
                usage,
            } => {
                // The final message is authoritative if the provider sent one.
                if !message.text().is_empty() {
                    self.text = message.text().to_string();
                }
                self.stop_reason = Some(*stop_reason);
                self.usage = usage.clone();
                self.done = true;
            }
            MessageEvent::Error { .. } => {}
        }
    }

    /// Text accumulated so far
    pub fn current_text(&self) -> &str {
        &self.text
    }

    /// Whether a Done event was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Build the final message
    pub fn build(self) -> Message {
        Message::Assistant {
            content: self.text,
            metadata: AssistantMetadata {
                model: self.model,
                usage: self.usage,
                stop_reason: self.stop_reason,
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_deltas() {
        let mut builder = MessageBuilder::new();
        builder.process_event(&MessageEvent::Start {
            model: "gemma2-9b-it".into(),
        });
        builder.process_event(&MessageEvent::TextDelta {
            delta: "Hello, ".into(),
        });
        builder.process_event(&MessageEvent::TextDelta {
            delta: "how can I help?".into(),
        });
        assert_eq!(builder.current_text(), "Hello, how can I help?");
        assert!(!builder.is_done());

        let msg = builder.build();
        assert_eq!(msg.text(), "Hello, how can I help?");
        match msg {
            Message::Assistant { metadata, .. } => {
                assert_eq!(metadata.model.as_deref(), Some("gemma2-9b-it"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_builder_prefers_final_message_text() {
        let mut builder = MessageBuilder::new();
        builder.process_event(&MessageEvent::TextDelta {
            delta: "partial".into(),
        });
        builder.process_event(&MessageEvent::Done {
            message: Message::assistant("complete answer"),
            stop_reason: StopReason::Stop,
            usage: Usage { input: 10, output: 3 },
        });
        assert!(builder.is_done());
        assert_eq!(builder.build().text(), "complete answer");
    }

    #[test]
    fn test_terminal_events() {
        assert!(MessageEvent::Error {
            message: "x".into()
        }
        .is_terminal());
        assert!(!MessageEvent::TextDelta { delta: "x".into() }.is_terminal());
    }
}
