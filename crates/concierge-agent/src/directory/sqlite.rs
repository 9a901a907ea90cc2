//! SQLite customer directory.
//!
//! A single `customers` table holds one row per registration:
//! `id` (autoincrement, insertion order), `name`, `email`, `status`, and
//! `created_at` (RFC 3339).

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::{CustomerDirectory, CustomerRecord, CustomerStatus, DirectoryError, best_match};

/// Directory persisted in a SQLite database.
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    /// Connect to a database URL such as `sqlite://customers.db` or
    /// `sqlite::memory:`. The file and table are created if missing.
    pub async fn connect(url: &str) -> Result<Self, DirectoryError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DirectoryError::Unavailable(format!("invalid database URL: {e}")))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` is a separate database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("failed to open SQLite: {e}")))?;

        let directory = Self::from_pool(pool).await?;
        info!("SQLite customer directory ready at {url}");
        Ok(directory)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, DirectoryError> {
        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    async fn run_migrations(&self) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'Active',
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("customers table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> Result<CustomerRecord, DirectoryError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| DirectoryError::InvalidRecord(format!("id column: {e}")))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| DirectoryError::InvalidRecord(format!("name column: {e}")))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| DirectoryError::InvalidRecord(format!("email column: {e}")))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| DirectoryError::InvalidRecord(format!("status column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| DirectoryError::InvalidRecord(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DirectoryError::InvalidRecord(format!("created_at `{created_at}`: {e}")))?;

        Ok(CustomerRecord {
            id,
            name,
            email,
            status: CustomerStatus::from_str(&status)?,
            created_at,
        })
    }
}

#[async_trait]
impl CustomerDirectory for SqliteDirectory {
    async fn find(&self, name: &str) -> Result<Option<CustomerRecord>, DirectoryError> {
        if name.trim().is_empty() {
            return Ok(None);
        }

        // SQLite's lower() folds ASCII only, so matching happens on decoded rows.
        let rows = sqlx::query(
            "SELECT id, name, email, status, created_at FROM customers ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("find: {e}")))?;

        let records = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(best_match(records.iter(), name).cloned())
    }

    async fn register(&self, name: &str, email: &str) -> Result<CustomerRecord, DirectoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO customers (name, email, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(name)
        .bind(email)
        .bind(CustomerStatus::Active.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("register: {e}")))?;

        let record = CustomerRecord {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
            status: CustomerStatus::Active,
            created_at,
        };
        debug!(id = record.id, "registered customer");
        Ok(record)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn directory() -> SqliteDirectory {
        SqliteDirectory::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_register_then_find() {
        let dir = directory().await;
        dir.register("John Smith", "john@example.com").await.unwrap();

        let found = dir.find("John Smith").await.unwrap().unwrap();
        assert_eq!(found.name, "John Smith");
        assert_eq!(found.email, "john@example.com");
        assert_eq!(found.status, CustomerStatus::Active);
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive_substring() {
        let dir = directory().await;
        dir.register("John Smith", "john@example.com").await.unwrap();
        assert_eq!(dir.find("john").await.unwrap().unwrap().name, "John Smith");
        assert!(dir.find("nobody").await.unwrap().is_none());
        assert!(dir.find("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_is_not_a_pattern() {
        let dir = directory().await;
        dir.register("John Smith", "john@example.com").await.unwrap();
        assert!(dir.find("%").await.unwrap().is_none());
        assert!(dir.find("J_hn").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tie_break() {
        let dir = directory().await;
        dir.register("Annabel Lee", "annabel@example.com").await.unwrap();
        dir.register("Ann", "ann@example.com").await.unwrap();
        dir.register("Joanna", "joanna@example.com").await.unwrap();

        assert_eq!(dir.find("ann").await.unwrap().unwrap().email, "ann@example.com");
        assert_eq!(dir.find("AN").await.unwrap().unwrap().email, "annabel@example.com");
    }

    #[tokio::test]
    async fn test_unknown_status_is_invalid_record() {
        let dir = directory().await;
        sqlx::query(
            "INSERT INTO customers (name, email, status, created_at) VALUES ('Eve', 'e@x.io', 'Banned', ?1)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&dir.pool)
        .await
        .unwrap();

        assert!(matches!(
            dir.find("eve").await,
            Err(DirectoryError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", tmp.path().join("customers.db").display());

        {
            let dir = SqliteDirectory::connect(&url).await.unwrap();
            dir.register("Grace Hopper", "grace@example.com").await.unwrap();
            dir.pool.close().await;
        }

        let dir = SqliteDirectory::connect(&url).await.unwrap();
        let found = dir.find("grace").await.unwrap().unwrap();
        assert_eq!(found.email, "grace@example.com");
    }

    #[tokio::test]
    async fn test_find_folds_non_ascii_case() {
        let dir = directory().await;
        dir.register("Émile Zola", "emile@example.com").await.unwrap();
        dir.register("ÅSA LINDQVIST", "asa@example.com").await.unwrap();

        assert_eq!(dir.find("émile").await.unwrap().unwrap().email, "emile@example.com");
        assert_eq!(dir.find("ÉMILE ZOLA").await.unwrap().unwrap().email, "emile@example.com");
        assert_eq!(dir.find("åsa").await.unwrap().unwrap().email, "asa@example.com");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_on_file() {
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", tmp.path().join("customers.db").display());
        let dir = std::sync::Arc::new(SqliteDirectory::connect(&url).await.unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dir = dir.clone();
                tokio::spawn(async move {
                    dir.register(&format!("Customer {i}"), &format!("c{i}@example.com"))
                        .await
                })
            })
            .collect();

        let mut returned = std::collections::HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert!(returned.insert(record.id));
        }

        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM customers")
            .fetch_all(&dir.pool)
            .await
            .unwrap();
        let stored: std::collections::HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 16);
        assert_eq!(stored, returned);

        for i in 0..16 {
            let email = format!("c{i}@example.com");
            let found = dir.find(&format!("customer {i}")).await.unwrap().unwrap();
            // "customer 1" also matches "Customer 10".."Customer 15"; exact names win.
            assert_eq!(found.email, email);
        }
    }
}
