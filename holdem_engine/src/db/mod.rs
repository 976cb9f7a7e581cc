//! Persistence: PostgreSQL connection pooling and the table repository.
//!
//! Tables, seats, hand lifecycle records and the per-hand chip ledger are
//! stored through [`TableRepository`]. [`PgTableRepository`] backs it with
//! PostgreSQL; [`InMemoryTableRepository`] keeps everything in process.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod memory;
pub mod models;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use errors::{PersistenceError, PersistenceResult};
pub use memory::InMemoryTableRepository;
pub use models::{
    HandStart, HandStatus, LedgerEntry, LedgerKind, SeatRecord, SettleOutcome, Settlement,
    TableRecord,
};
pub use repository::{PgTableRepository, TableRepository};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use holdem_engine::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::development();
    ///     let db = Database::new(&config).await?;
    ///     db.health_check().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Table repository sharing this pool.
    pub fn table_repository(&self) -> PgTableRepository {
        PgTableRepository::new(self.pool.clone())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
