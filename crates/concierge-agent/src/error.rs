//! Error types for concierge-agent

use std::time::Duration;

use thiserror::Error;

use crate::{directory::DirectoryError, knowledge::KnowledgeBaseError};

/// Result type alias using concierge-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// The knowledge base could not be loaded
    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),

    /// The customer directory failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The language model could not produce a reply
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The language model did not finish within the configured time
    #[error("Model timed out after {0:?}")]
    ModelTimeout(Duration),

    /// A reply is already being generated for this session
    #[error("A reply is already being generated")]
    Busy,
}

impl Error {
    /// Whether the error came from the generation step
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Error::ModelUnavailable(_) | Error::ModelTimeout(_))
    }

    /// Whether the error is a generation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ModelTimeout(_))
    }
}

impl From<concierge_ai::Error> for Error {
    fn from(err: concierge_ai::Error) -> Self {
        Error::ModelUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_become_model_unavailable() {
        let err: Error = concierge_ai::Error::InvalidApiKey.into();
        assert!(matches!(err, Error::ModelUnavailable(_)));
        assert!(err.is_generation_failure());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_busy_is_not_a_generation_failure() {
        assert!(!Error::Busy.is_generation_failure());
        assert!(Error::ModelTimeout(Duration::from_secs(1)).is_timeout());
    }
}
