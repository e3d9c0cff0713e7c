//! Transactional data-access core
//!
//! This crate groups database work into units of work over PostgreSQL using
//! SQLx. A [`UnitOfWork`] owns one transaction; repositories handed out by it
//! stage reads and writes inside that transaction, and nothing is durable
//! until the unit of work commits.
//!
//! # Layout
//!
//! - [`unit_of_work`]: lifecycle, repository memoization, the factory
//! - [`repositories`]: the generic repository and its catalog entities
//! - [`specification`]: composable filters rendered to parameterized SQL
//! - [`error`]: the error taxonomy and the storage error translator
//! - [`pool`]: pool configuration, health check, migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, UnitOfWorkFactory};
//! use infra_db::repositories::item::owner_is;
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/catalog")).await?;
//! let factory = UnitOfWorkFactory::new(pool);
//!
//! let mut uow = factory.begin().await?;
//! let owned = uow.items().find_by_specification(owner_is(user_id)).await?;
//! uow.close().await;
//! ```

pub mod entity;
pub mod error;
pub mod pool;
pub mod repositories;
pub mod session;
pub mod specification;
pub mod unit_of_work;
pub mod value;

pub use entity::Entity;
pub use error::{translate, DatabaseError, ErrorKind};
pub use pool::{
    check_health, create_lazy_pool, create_pool, migrator, run_migrations,
    DatabaseConfig, DatabasePool,
};
pub use repositories::{BoundRepository, ItemField, Page, Repository, UserField};
pub use session::UnitOfWorkState;
pub use specification::{Column, Direction, Filter, Query, Specification};
pub use unit_of_work::{ScopedWork, UnitOfWork, UnitOfWorkFactory};
pub use value::Value;
