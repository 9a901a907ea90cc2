//! In-memory customer directory.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CustomerDirectory, CustomerRecord, CustomerStatus, DirectoryError, best_match};

/// Process-local directory. Records are lost when the process exits.
pub struct InMemoryDirectory {
    records: RwLock<Vec<CustomerRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryDirectory {
    async fn find(&self, name: &str) -> Result<Option<CustomerRecord>, DirectoryError> {
        let records = self.records.read().await;
        Ok(best_match(records.iter(), name).cloned())
    }

    async fn register(&self, name: &str, email: &str) -> Result<CustomerRecord, DirectoryError> {
        let mut records = self.records.write().await;
        let record = CustomerRecord {
            id: records.len() as i64 + 1,
            name: name.to_string(),
            email: email.to_string(),
            status: CustomerStatus::Active,
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_then_find() {
        let dir = InMemoryDirectory::new();
        let saved = dir.register("John Smith", "john@example.com").await.unwrap();
        assert_eq!(saved.status, CustomerStatus::Active);

        let found = dir.find("John Smith").await.unwrap().unwrap();
        assert_eq!(found.name, "John Smith");
        assert_eq!(found.email, "john@example.com");
        assert_eq!(found.status, CustomerStatus::Active);
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive_substring() {
        let dir = InMemoryDirectory::new();
        dir.register("John Smith", "john@example.com").await.unwrap();
        assert_eq!(dir.find("john").await.unwrap().unwrap().name, "John Smith");
        assert_eq!(dir.find("SMI").await.unwrap().unwrap().name, "John Smith");
        assert!(dir.find("jane").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_are_permitted() {
        let dir = InMemoryDirectory::new();
        let a = dir.register("Ann", "a@example.com").await.unwrap();
        let b = dir.register("Ann", "b@example.com").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(dir.len().await, 2);
        assert_eq!(dir.find("ann").await.unwrap().unwrap().email, "a@example.com");
    }

    #[tokio::test]
    async fn test_exact_match_beats_earlier_substring() {
        let dir = InMemoryDirectory::new();
        dir.register("Annabel Lee", "annabel@example.com").await.unwrap();
        dir.register("Ann", "ann@example.com").await.unwrap();
        assert_eq!(dir.find("ANN").await.unwrap().unwrap().email, "ann@example.com");
        assert_eq!(dir.find("an").await.unwrap().unwrap().email, "annabel@example.com");
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let dir = Arc::new(InMemoryDirectory::new());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let dir = Arc::clone(&dir);
            tasks.push(tokio::spawn(async move {
                dir.register(&format!("Customer {i}"), "c@example.com").await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(dir.len().await, 16);
    }
}
