//! Catalog migration binary
//!
//! Applies the embedded schema migrations and checks that the database
//! answers, then exits.
//!
//! # Usage
//!
//! ```bash
//! APP__DATABASE__HOST=db APP__DATABASE__PASSWORD=secret cargo run --bin catalog-migrate
//! ```
//!
//! # Environment Variables
//!
//! * `APP__DATABASE__HOST`, `APP__DATABASE__PORT`, `APP__DATABASE__USER`,
//!   `APP__DATABASE__PASSWORD`, `APP__DATABASE__NAME` - connection settings
//! * `APP__LOG_LEVEL` - filter directive when `RUST_LOG` is unset (default: info)
//! * `APP__LOG_FORMAT` - `text` or `json` (default: text)

use anyhow::Context;
use app_services::{init_tracing, AppConfig};
use infra_db::{check_health, create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level, config.log_format)?;

    tracing::info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.name,
        "applying catalog migrations"
    );

    let pool = create_pool(config.database.pool_config())
        .await
        .context("cannot connect to the database")?;
    run_migrations(&pool).await?;
    check_health(&pool).await.context("health check failed")?;

    tracing::info!("database ready");
    pool.close().await;
    Ok(())
}
