//! Reply generation: one model call per composed prompt

use std::{sync::Arc, time::Duration};

use concierge_ai::{MessageBuilder, MessageEvent};
use futures::StreamExt;

use crate::{
    error::{Error, Result},
    transport::Transport,
};

/// Default upper bound on a single generation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Invokes the language model and returns its complete reply
#[derive(Clone)]
pub struct ResponseGenerator {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ResponseGenerator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Generate a reply for a composed prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with(prompt, |_| {}).await
    }

    /// Generate a reply, passing each streamed text fragment to `on_delta`.
    /// The returned text is the whole reply, unmodified.
    pub async fn generate_with<F>(&self, prompt: &str, mut on_delta: F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let collect = async {
            let mut stream = self.transport.stream(prompt).await?;
            let mut builder = MessageBuilder::new();

            while let Some(event) = stream.next().await {
                builder.process_event(&event);
                match event {
                    MessageEvent::TextDelta { delta } => on_delta(&delta),
                    MessageEvent::Error { message } => return Err(Error::ModelUnavailable(message)),
                    MessageEvent::Done { .. } => break,
                    MessageEvent::Start { .. } => {}
                }
            }

            if !builder.is_done() {
                return Err(Error::ModelUnavailable(
                    "response stream ended before completion".to_string(),
                ));
            }
            Ok(builder.build().text().to_string())
        };

        match tokio::time::timeout(self.timeout, collect).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "generation timed out");
                Err(Error::ModelTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_ai::{Message, MessageEventStream, StopReason, Usage};

    struct Scripted(Vec<MessageEvent>);

    #[async_trait]
    impl Transport for Scripted {
        async fn stream(&self, _prompt: &str) -> concierge_ai::Result<MessageEventStream> {
            Ok(Box::pin(futures::stream::iter(self.0.clone())))
        }
    }

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn stream(&self, _prompt: &str) -> concierge_ai::Result<MessageEventStream> {
            Ok(Box::pin(futures::stream::pending::<MessageEvent>()))
        }
    }

    struct Refused;

    #[async_trait]
    impl Transport for Refused {
        async fn stream(&self, _prompt: &str) -> concierge_ai::Result<MessageEventStream> {
            Err(concierge_ai::Error::InvalidApiKey)
        }
    }

    fn done(text: &str) -> MessageEvent {
        MessageEvent::Done {
            message: Message::assistant(text),
            stop_reason: StopReason::Stop,
            usage: Usage::default(),
        }
    }

    #[tokio::test]
    async fn test_collects_streamed_reply() {
        let generator = ResponseGenerator::new(Arc::new(Scripted(vec![
            MessageEvent::Start {
                model: "m".into(),
            },
            MessageEvent::TextDelta {
                delta: "Refunds take ".into(),
            },
            MessageEvent::TextDelta {
                delta: "5 days.".into(),
            },
            done("Refunds take 5 days."),
        ])));

        let mut seen = Vec::new();
        let reply = generator
            .generate_with("prompt", |d| seen.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(reply, "Refunds take 5 days.");
        assert_eq!(seen, vec!["Refunds take ", "5 days."]);
    }

    #[tokio::test]
    async fn test_markup_is_returned_verbatim() {
        let text = "<b>Hello</b> **there**";
        let generator = ResponseGenerator::new(Arc::new(Scripted(vec![
            MessageEvent::TextDelta { delta: text.into() },
            done(text),
        ])));
        assert_eq!(generator.generate("p").await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_error_event_is_model_unavailable() {
        let generator = ResponseGenerator::new(Arc::new(Scripted(vec![MessageEvent::Error {
            message: "Rate limited".into(),
        }])));
        let err = generator.generate("p").await.unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable(m) if m == "Rate limited"));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_model_unavailable() {
        let generator = ResponseGenerator::new(Arc::new(Scripted(vec![MessageEvent::TextDelta {
            delta: "half".into(),
        }])));
        assert!(matches!(
            generator.generate("p").await,
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_is_model_unavailable() {
        let generator = ResponseGenerator::new(Arc::new(Refused));
        assert!(matches!(
            generator.generate("p").await,
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_transport_times_out() {
        let generator =
            ResponseGenerator::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(5));
        let err = generator.generate("p").await.unwrap_err();
        assert!(err.is_timeout());
    }
}
