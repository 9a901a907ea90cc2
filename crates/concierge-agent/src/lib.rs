//! concierge-agent: FAQ-grounded conversation runtime
//!
//! This crate loads the knowledge base, composes grounded prompts, drives
//! the per-session submit/reply cycle and talks to the customer directory.

pub mod conversation;
pub mod directory;
pub mod error;
pub mod events;
pub mod generator;
pub mod handle;
pub mod knowledge;
pub mod prompt;
pub mod session;
pub mod transport;

pub use conversation::{Conversation, ConversationTurn, Role};
pub use directory::{
    CustomerDirectory, CustomerLookup, CustomerRecord, CustomerStatus, DirectoryError,
    DisconnectedDirectory, InMemoryDirectory, SqliteDirectory, lookup,
};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use generator::ResponseGenerator;
pub use handle::SessionHandle;
pub use knowledge::{FaqEntry, KnowledgeBase, KnowledgeBaseError};
pub use prompt::{FullCorpus, Grounding, PromptComposer, REFUSAL_MESSAGE};
pub use session::{
    ERROR_TURN_TEXT, FailurePolicy, PendingInputBuffer, Session, SessionConfig, SessionFactory,
    SessionState, SubmitOutcome,
};
pub use transport::{ProviderTransport, RetryConfig, Transport};
