use anyhow::{Context, Result};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, Statement,
    TransactionTrait,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub mod migrator;
pub mod repositories;

pub use repositories::student::StudentRepository;

/// Process-wide handle to the connection pool.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    /// Connects, verifies the database answers and brings the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let mut opt = ConnectOptions::new(config.connection_url());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(timeout)
            .acquire_timeout(timeout)
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .with_context(|| format!("Failed to connect to database at {}", config.redacted_url()))?;

        let store = Self { conn };
        store
            .ping()
            .await
            .context("Database connectivity check failed")?;

        migrator::Migrator::up(&store.conn, None)
            .await
            .context("Failed to apply database migrations")?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            config.min_connections, config.max_connections
        );

        Ok(store)
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Checks out one connection and starts a unit of work on it.
    pub async fn open_session(&self) -> Result<Session> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open database session")?;
        Ok(Session { txn })
    }
}

/// A unit of work bound to a single pooled connection.
///
/// Nothing is visible to other sessions until [`Session::commit`]. A session
/// that is closed, or simply dropped on an early return, is rolled back and
/// its connection goes back to the pool.
pub struct Session {
    txn: DatabaseTransaction,
}

impl Session {
    #[must_use]
    pub const fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<()> {
        self.txn
            .commit()
            .await
            .context("Failed to commit database session")
    }

    pub async fn close(self) -> Result<()> {
        self.txn
            .rollback()
            .await
            .context("Failed to close database session")
    }
}
