//! Customer directory: fuzzy lookup and registration of customer records.
//!
//! Backends:
//! - [`InMemoryDirectory`]: process-local, used in tests
//! - [`SqliteDirectory`]: persistent, backed by sqlx/SQLite
//! - [`DisconnectedDirectory`]: stands in when the store cannot be opened
//!
//! Lookups are case-insensitive substring matches on the name. When several
//! records match, a record whose name equals the query (ignoring case) wins;
//! otherwise the earliest inserted record wins. A blank query matches nothing.

mod disconnected;
mod memory;
mod sqlite;

pub use disconnected::DisconnectedDirectory;
pub use memory::InMemoryDirectory;
pub use sqlite::SqliteDirectory;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a directory backend
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The store could not be reached or the query failed
    #[error("Customer directory unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded
    #[error("Invalid customer record: {0}")]
    InvalidRecord(String),
}

/// Account status of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "Active",
            CustomerStatus::Inactive => "Inactive",
            CustomerStatus::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(CustomerStatus::Active),
            "inactive" => Ok(CustomerStatus::Inactive),
            "suspended" => Ok(CustomerStatus::Suspended),
            other => Err(DirectoryError::InvalidRecord(format!(
                "unknown status `{}`",
                other
            ))),
        }
    }
}

/// A stored customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Store-assigned, increasing in insertion order
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for CustomerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Customer: {} | Email: {} | Status: {}",
            self.name, self.email, self.status
        )
    }
}

/// Storage for customer records
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Find the best record whose name contains `name`, ignoring case
    async fn find(&self, name: &str) -> Result<Option<CustomerRecord>, DirectoryError>;

    /// Insert a new `Active` record. Duplicates are allowed.
    async fn register(&self, name: &str, email: &str) -> Result<CustomerRecord, DirectoryError>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Outcome of a lookup that never fails the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerLookup {
    Found(CustomerRecord),
    NotFound,
    /// The directory could not answer
    Unknown,
}

/// Look up a customer, degrading directory failures to `Unknown`.
pub async fn lookup(directory: &dyn CustomerDirectory, name: &str) -> CustomerLookup {
    match directory.find(name).await {
        Ok(Some(record)) => CustomerLookup::Found(record),
        Ok(None) => CustomerLookup::NotFound,
        Err(e) => {
            tracing::warn!(backend = directory.name(), "customer lookup failed: {}", e);
            CustomerLookup::Unknown
        }
    }
}

/// Pick the winning record among candidates in insertion order.
pub(crate) fn best_match<'a, I>(candidates: I, query: &str) -> Option<&'a CustomerRecord>
where
    I: IntoIterator<Item = &'a CustomerRecord>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let mut first = None;
    for record in candidates {
        let name = record.name.to_lowercase();
        if name == needle {
            return Some(record);
        }
        if first.is_none() && name.contains(&needle) {
            first = Some(record);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> CustomerRecord {
        CustomerRecord {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", id),
            status: CustomerStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_format() {
        let mut r = record(1, "John Smith");
        r.email = "john@example.com".into();
        assert_eq!(
            r.to_string(),
            "Customer: John Smith | Email: john@example.com | Status: Active"
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("ACTIVE".parse::<CustomerStatus>().unwrap(), CustomerStatus::Active);
        assert_eq!(
            "suspended".parse::<CustomerStatus>().unwrap(),
            CustomerStatus::Suspended
        );
        assert!(matches!(
            "deleted".parse::<CustomerStatus>(),
            Err(DirectoryError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_best_match_prefers_exact_name() {
        let records = vec![record(1, "Ann Smith"), record(2, "Ann")];
        assert_eq!(best_match(&records, "ann").unwrap().id, 2);
    }

    #[test]
    fn test_best_match_falls_back_to_first_inserted() {
        let records = vec![record(1, "Johnny Cash"), record(2, "John Smith")];
        assert_eq!(best_match(&records, "JOHN").unwrap().id, 1);
    }

    #[test]
    fn test_best_match_blank_query() {
        let records = vec![record(1, "Ann")];
        assert!(best_match(&records, "  ").is_none());
    }

    #[tokio::test]
    async fn test_backends_agree_on_non_ascii_names() {
        let backends: Vec<Box<dyn CustomerDirectory>> = vec![
            Box::new(InMemoryDirectory::new()),
            Box::new(SqliteDirectory::connect("sqlite::memory:").await.unwrap()),
        ];

        for dir in &backends {
            dir.register("Émile Zola", "emile@example.com").await.unwrap();
            dir.register("Zoë", "zoe@example.com").await.unwrap();

            let found = dir.find("émile").await.unwrap();
            assert_eq!(
                found.map(|r| r.email).as_deref(),
                Some("emile@example.com"),
                "backend {}",
                dir.name()
            );
            let found = dir.find("ZOË").await.unwrap();
            assert_eq!(
                found.map(|r| r.email).as_deref(),
                Some("zoe@example.com"),
                "backend {}",
                dir.name()
            );
        }
    }
}
