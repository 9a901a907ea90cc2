//! concierge-ai: language-model provider layer
//!
//! Model descriptors, a provider trait and an OpenAI-compatible chat
//! completions client (Groq, OpenAI, OpenRouter, Ollama and friends).

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{MessageBuilder, MessageEvent, MessageEventStream};
pub use types::*;
