//! Catalog application services
//!
//! Thin services over the transactional core. Every public operation opens
//! its own unit of work through [`infra_db::UnitOfWorkFactory::run`], checks
//! the catalog's business rules, and commits explicitly.
//!
//! # Example
//!
//! ```rust,ignore
//! use app_services::{AppConfig, Services};
//!
//! let config = AppConfig::from_env()?;
//! let services = Services::connect(&config).await?;
//! let item = services.items.create_item(NewItem::new("Lamp")).await?;
//! ```

pub mod config;
pub mod error;
pub mod item_service;
pub mod telemetry;
pub mod user_service;

pub use config::{AppConfig, DatabaseSettings, LogFormat};
pub use error::ServiceError;
pub use item_service::ItemService;
pub use telemetry::init_tracing;
pub use user_service::UserService;

use infra_db::{create_pool, DatabaseError, DatabasePool, UnitOfWorkFactory};

/// Both services over one pool
#[derive(Debug, Clone)]
pub struct Services {
    pub items: ItemService,
    pub users: UserService,
}

impl Services {
    pub fn new(pool: DatabasePool) -> Self {
        let factory = UnitOfWorkFactory::new(pool);
        Self {
            items: ItemService::new(factory.clone()),
            users: UserService::new(factory),
        }
    }

    /// Creates the pool described by `config` and the services over it
    pub async fn connect(config: &AppConfig) -> Result<Self, DatabaseError> {
        let pool = create_pool(config.database.pool_config()).await?;
        Ok(Self::new(pool))
    }
}
