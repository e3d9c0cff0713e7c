//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container per test with the catalog
//! migrations applied. Tests that need a database call
//! [`TestDatabase::start`], which panics when no container runtime is
//! available.

use std::time::Duration;

use infra_db::{run_migrations, DatabaseConfig, DatabasePool, UnitOfWorkFactory};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "catalog_test";

/// Attempts made while the server finishes its init restart
const CONNECT_ATTEMPTS: u32 = 20;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Connection settings for a test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    /// Pool settings used by tests; small pool, short acquire timeout
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.connection_url())
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
    }
}

/// A PostgreSQL container with the catalog schema applied
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: DatabasePool,
}

impl TestDatabase {
    /// Starts a container, connects, and runs the migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or the schema cannot
    /// be applied
    pub async fn new() -> TestResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();
        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        let pool = connect_with_retry(&config).await?;
        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Like [`TestDatabase::new`], for use inside tests
    ///
    /// # Panics
    ///
    /// Panics if the container cannot be started or migrated
    pub async fn start() -> Self {
        match Self::new().await {
            Ok(db) => db,
            Err(e) => panic!("Failed to start test database (is a container runtime running?): {e}"),
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// A unit of work factory over this database's pool
    pub fn factory(&self) -> UnitOfWorkFactory {
        UnitOfWorkFactory::new(self.pool.clone())
    }

    /// Row count of `table`, read outside any unit of work
    pub async fn count_rows(&self, table: &str) -> TestResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn connect_with_retry(config: &TestDatabaseConfig) -> TestResult<DatabasePool> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match infra_db::create_pool(config.pool_config()).await {
            Ok(pool) => return Ok(pool),
            Err(_) if attempt < CONNECT_ATTEMPTS => {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Defines a database test; it fails without a container runtime
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$db:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            let $db = $crate::database::TestDatabase::start().await;
            $body
        }
    };
}
