//! Database connection pool management
//!
//! Every unit of work borrows one connection from the pool for the lifetime
//! of its transaction. A caller that cannot get a connection within the
//! acquire timeout sees `DatabaseError::Connection`.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Configuration options for the database connection pool
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres://localhost/catalog")
///     .max_connections(20)
///     .min_connections(5)
///     .acquire_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_connections, 20);
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
    /// Idle time before a connection is closed
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    /// Creates a configuration with default pool sizing for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .max_lifetime(self.max_lifetime)
            .idle_timeout(self.idle_timeout)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/catalog")
    }
}

/// Creates a connection pool and verifies it can connect
///
/// # Errors
///
/// Returns `DatabaseError::Connection` if no connection can be established
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::{DatabaseConfig, create_pool};
///
/// let pool = create_pool(DatabaseConfig::new("postgres://localhost/catalog")).await?;
/// ```
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
        "creating database pool"
    );

    let pool = config
        .options()
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::Connection {
            message: e.to_string(),
            source: Some(e),
        })?;

    info!("database pool created");
    Ok(pool)
}

/// Creates a pool that opens connections on first use
///
/// # Errors
///
/// Returns `DatabaseError::Connection` if the URL cannot be parsed
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    config
        .options()
        .connect_lazy(&config.url)
        .map_err(|e| DatabaseError::Connection {
            message: e.to_string(),
            source: Some(e),
        })
}

/// Round-trips a trivial query through the pool
pub async fn check_health(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Embedded schema migrations
pub fn migrator() -> &'static Migrator {
    &MIGRATOR
}

/// Applies every pending migration
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await.map_err(migration_failed)?;
    info!(migrations = MIGRATOR.iter().count(), "migrations applied");
    Ok(())
}

fn migration_failed(error: MigrateError) -> DatabaseError {
    DatabaseError::Persistence {
        message: format!("migration failed: {}", error),
        source: Some(sqlx::Error::Migrate(Box::new(error))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(5));

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(migrator().iter().count() >= 1);
    }

    #[test]
    fn test_migration_failure_keeps_its_cause() {
        let err = migration_failed(MigrateError::VersionMissing(20240101000000));
        assert!(matches!(err, DatabaseError::Persistence { .. }));
        assert!(err.to_string().contains("migration failed"));

        let source = std::error::Error::source(&err).expect("cause is kept");
        assert!(source.to_string().contains("20240101000000"));
    }

    #[tokio::test]
    async fn test_lazy_pool_rejects_bad_url() {
        let err = create_lazy_pool(&DatabaseConfig::new("not a url")).unwrap_err();
        assert!(err.is_connection_error());
    }
}
