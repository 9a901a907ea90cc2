//! Transport abstraction between the generator and a model provider

use std::{sync::Arc, time::Duration};

use async_stream::stream;
use async_trait::async_trait;
use concierge_ai::{
    CompletionOptions, Context, MessageEvent, MessageEventStream, Model, Result,
    providers::LlmProvider,
};
use futures::StreamExt;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry configuration with the given attempt budget and default backoff
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Check if an error message describes a transient failure
pub fn is_retryable_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        return true;
    }
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("connection") {
        return true;
    }
    if ["500", "502", "503", "504", "http_5"]
        .iter()
        .any(|code| lower.contains(code))
    {
        return true;
    }
    lower.contains("overloaded") || lower.contains("sse error")
}

/// Something that turns a composed prompt into a stream of model events
#[async_trait]
pub trait Transport: Send + Sync {
    async fn stream(&self, prompt: &str) -> Result<MessageEventStream>;
}

/// Transport that calls a provider directly with a fixed model and options
pub struct ProviderTransport {
    provider: Arc<dyn LlmProvider>,
    model: Model,
    options: CompletionOptions,
    retry_config: RetryConfig,
}

impl ProviderTransport {
    pub fn new(provider: Arc<dyn LlmProvider>, model: Model, options: CompletionOptions) -> Self {
        Self {
            provider,
            model,
            options,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn stream(&self, prompt: &str) -> Result<MessageEventStream> {
        let context = Context::from_prompt(prompt);
        let provider = Arc::clone(&self.provider);
        let model = self.model.clone();
        let options = self.options.clone();
        let retry_config = self.retry_config.clone();

        let event_stream: MessageEventStream = Box::pin(stream! {
            let mut attempt = 0u32;

            'attempts: loop {
                let failure = match provider.stream(&model, &context, &options).await {
                    Ok(mut inner) => {
                        // Once text has been forwarded the attempt is committed.
                        let mut forwarded = false;
                        let mut failure = None;
                        while let Some(event) = inner.next().await {
                            match event {
                                MessageEvent::Error { message } if !forwarded => {
                                    failure = Some((is_retryable_error(&message), message));
                                    break;
                                }
                                MessageEvent::Start { .. } if attempt > 0 => {}
                                event => {
                                    if matches!(event, MessageEvent::TextDelta { .. }) {
                                        forwarded = true;
                                    }
                                    let terminal = event.is_terminal();
                                    yield event;
                                    if terminal {
                                        return;
                                    }
                                }
                            }
                        }
                        match failure {
                            Some(failure) => failure,
                            None => return,
                        }
                    }
                    Err(e) => {
                        let message = e.to_string();
                        (e.is_retryable() || is_retryable_error(&message), message)
                    }
                };

                let (retryable, message) = failure;
                if retryable && attempt < retry_config.max_retries {
                    let delay = retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        retry_config.max_retries + 1,
                        message,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    continue 'attempts;
                }

                yield MessageEvent::Error { message };
                return;
            }
        });

        Ok(event_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_ai::{Message, StopReason, Usage, models};
    use parking_lot::Mutex;

    /// Provider that replays one scripted outcome per call.
    struct ScriptedProvider {
        calls: Mutex<Vec<std::result::Result<Vec<MessageEvent>, concierge_ai::Error>>>,
        count: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(calls: Vec<std::result::Result<Vec<MessageEvent>, concierge_ai::Error>>) -> Self {
            Self {
                calls: Mutex::new(calls),
                count: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.count.lock()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn stream(
            &self,
            _model: &Model,
            _context: &Context,
            _options: &CompletionOptions,
        ) -> Result<MessageEventStream> {
            *self.count.lock() += 1;
            let next = {
                let mut calls = self.calls.lock();
                if calls.is_empty() {
                    Ok(vec![])
                } else {
                    calls.remove(0)
                }
            };
            let events = next?;
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn reply(text: &str) -> Vec<MessageEvent> {
        vec![
            MessageEvent::Start {
                model: "test".into(),
            },
            MessageEvent::TextDelta {
                delta: text.into(),
            },
            MessageEvent::Done {
                message: Message::assistant(text),
                stop_reason: StopReason::Stop,
                usage: Usage::default(),
            },
        ]
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    fn transport(provider: Arc<ScriptedProvider>, retries: u32) -> ProviderTransport {
        ProviderTransport::new(provider, models::default_model(), CompletionOptions::default())
            .with_retry_config(fast_retries(retries))
    }

    async fn collect(transport: &ProviderTransport) -> Vec<MessageEvent> {
        transport.stream("hello").await.unwrap().collect().await
    }

    #[test]
    fn test_default_does_not_retry() {
        assert_eq!(RetryConfig::default().max_retries, 0);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error("Rate limited: retry after None seconds"));
        assert!(is_retryable_error("API error: unavailable (type: http_503)"));
        assert!(is_retryable_error("SSE error: connection reset"));
        assert!(!is_retryable_error("Authentication failed: invalid key"));
        assert!(!is_retryable_error("Model not found: gemma"));
    }

    #[tokio::test]
    async fn test_passes_events_through() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(reply("Hi there"))]));
        let events = collect(&transport(provider.clone(), 0)).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events.last(), Some(MessageEvent::Done { .. })));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failure_before_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(concierge_ai::Error::RateLimited { retry_after: None }),
            Ok(vec![MessageEvent::Error {
                message: "API error: busy (type: overloaded_error)".into(),
            }]),
            Ok(reply("recovered")),
        ]));
        let events = collect(&transport(provider.clone(), 2)).await;
        assert_eq!(provider.call_count(), 3);
        assert!(matches!(events.last(), Some(MessageEvent::Done { .. })));
        let starts = events
            .iter()
            .filter(|e| matches!(e, MessageEvent::Start { .. }))
            .count();
        assert!(starts <= 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(concierge_ai::Error::RateLimited { retry_after: None }),
            Err(concierge_ai::Error::RateLimited { retry_after: None }),
        ]));
        let events = collect(&transport(provider.clone(), 1)).await;
        assert_eq!(provider.call_count(), 2);
        assert!(matches!(events.as_slice(), [MessageEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            concierge_ai::Error::Auth("bad key".into()),
        )]));
        let events = collect(&transport(provider.clone(), 3)).await;
        assert_eq!(provider.call_count(), 1);
        match events.as_slice() {
            [MessageEvent::Error { message }] => assert!(message.contains("bad key")),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_after_text_is_not_retried() {
        let mut events = reply("partial");
        events.truncate(2);
        events.push(MessageEvent::Error {
            message: "SSE error: connection reset".into(),
        });
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(events), Ok(reply("again"))]));
        let out = collect(&transport(provider.clone(), 3)).await;
        assert_eq!(provider.call_count(), 1);
        assert!(matches!(out.last(), Some(MessageEvent::Error { .. })));
    }
}
