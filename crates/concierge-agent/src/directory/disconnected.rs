//! Placeholder directory used when the real store could not be opened.

use async_trait::async_trait;

use super::{CustomerDirectory, CustomerRecord, DirectoryError};

/// Answers every call with [`DirectoryError::Unavailable`], so lookups
/// degrade to `Unknown` and registrations are refused instead of lost.
pub struct DisconnectedDirectory {
    reason: String,
}

impl DisconnectedDirectory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl CustomerDirectory for DisconnectedDirectory {
    async fn find(&self, _name: &str) -> Result<Option<CustomerRecord>, DirectoryError> {
        Err(DirectoryError::Unavailable(self.reason.clone()))
    }

    async fn register(&self, _name: &str, _email: &str) -> Result<CustomerRecord, DirectoryError> {
        Err(DirectoryError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disconnected"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CustomerLookup, lookup};

    #[tokio::test]
    async fn test_every_call_is_unavailable() {
        let dir = DisconnectedDirectory::new("failed to open SQLite: disk I/O error");

        assert!(matches!(
            dir.find("john").await,
            Err(DirectoryError::Unavailable(reason)) if reason.contains("disk I/O")
        ));
        assert!(matches!(
            dir.register("John", "john@example.com").await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert_eq!(lookup(&dir, "john").await, CustomerLookup::Unknown);
    }
}
