//! Unit of Work: one transaction, many repositories
//!
//! A [`UnitOfWork`] owns a [`Session`] and hands out repositories bound to
//! it. Every write staged through those repositories commits or rolls back
//! together. Nothing is committed implicitly: closing or dropping an open
//! unit of work rolls it back.
//!
//! # Example
//!
//! ```rust,ignore
//! let factory = UnitOfWorkFactory::new(pool);
//! let item = factory
//!     .run(|uow| {
//!         Box::pin(async move {
//!             let owner = uow.users().create(&NewUser::new("ada")).await?;
//!             let item = uow
//!                 .items()
//!                 .create(&NewItem::new("Lamp").owned_by(owner.id))
//!                 .await?;
//!             uow.commit().await?;
//!             Ok::<_, DatabaseError>(item)
//!         })
//!     })
//!     .await?;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use domain_catalog::{Item, User};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::DatabaseError;
use crate::pool::DatabasePool;
use crate::repositories::{BoundRepository, Repository};
use crate::session::{Session, UnitOfWorkState};

/// Boxed future returned by the closure passed to [`UnitOfWorkFactory::run`]
pub type ScopedWork<'u, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'u>>;

/// A transactional boundary over one session
pub struct UnitOfWork {
    pool: DatabasePool,
    session: Session,
    repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl UnitOfWork {
    /// Creates a unit of work in the `Created` state; no connection is taken
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            session: Session::new(),
            repositories: HashMap::new(),
        }
    }

    /// Begins the transaction
    ///
    /// # Errors
    ///
    /// - `DatabaseError::InvalidState` unless the unit of work is `Created`
    /// - `DatabaseError::Connection` if the pool cannot supply a connection
    ///   within its acquire timeout
    pub async fn open(&mut self) -> Result<(), DatabaseError> {
        self.session.begin(&self.pool).await
    }

    /// Returns the repository for `E`, creating it on first request
    ///
    /// Repeated requests within one unit of work return the same instance.
    pub fn repository<E: Entity>(&mut self) -> BoundRepository<'_, E> {
        let session_id = self.session.id();
        let slot = self
            .repositories
            .entry(TypeId::of::<Repository<E>>())
            .or_insert_with(|| {
                debug!(session_id = %session_id, entity = E::NAME, "repository created");
                let repository: Box<dyn Any + Send + Sync> =
                    Box::new(Repository::<E>::new(session_id));
                repository
            });
        let Some(repository) = slot.downcast_ref::<Repository<E>>() else {
            unreachable!("repository cache is keyed by the repository's own TypeId");
        };
        BoundRepository::new(repository, &mut self.session)
    }

    pub fn items(&mut self) -> BoundRepository<'_, Item> {
        self.repository::<Item>()
    }

    pub fn users(&mut self) -> BoundRepository<'_, User> {
        self.repository::<User>()
    }

    /// Makes every staged change durable
    ///
    /// # Errors
    ///
    /// - `DatabaseError::InvalidState` unless the unit of work is `Open`
    /// - the translated storage error if the commit fails, in which case the
    ///   unit of work ends up `RolledBack`
    pub async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.session.commit().await
    }

    /// Runs `work` inside a savepoint of the open transaction
    ///
    /// If `work` succeeds the savepoint is released and its writes stay
    /// staged in the enclosing transaction. If it fails, its writes are
    /// rolled back to the savepoint and the unit of work stays `Open`.
    /// Savepoints nest.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::InvalidState` unless the unit of work is `Open`
    /// - the error returned by `work`
    pub async fn savepoint<T, E, W>(&mut self, work: W) -> Result<T, E>
    where
        W: for<'u> FnOnce(&'u mut UnitOfWork) -> ScopedWork<'u, T, E>,
        E: From<DatabaseError>,
    {
        self.session.begin_savepoint().await?;
        match work(&mut *self).await {
            Ok(value) => {
                self.session.release_savepoint().await?;
                Ok(value)
            }
            Err(error) => {
                self.session.discard_savepoint().await?;
                Err(error)
            }
        }
    }

    /// Discards every staged change
    ///
    /// A second rollback is a no-op. Rolling back a unit of work that was
    /// never opened, or has committed or closed, is `InvalidState`.
    pub async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.session.rollback().await
    }

    /// Releases the session, rolling back first if still open
    pub async fn close(&mut self) {
        self.session.close().await;
        self.repositories.clear();
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.session.state()
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Number of savepoints currently established
    pub fn savepoint_depth(&self) -> usize {
        self.session.savepoint_depth()
    }

    /// Number of repositories created so far
    pub fn cached_repositories(&self) -> usize {
        self.repositories.len()
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("session", &self.session)
            .field("repositories", &self.repositories.len())
            .finish_non_exhaustive()
    }
}

/// Produces units of work over a shared pool
#[derive(Debug, Clone)]
pub struct UnitOfWorkFactory {
    pool: DatabasePool,
}

impl UnitOfWorkFactory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// A fresh, unopened unit of work
    pub fn create(&self) -> UnitOfWork {
        UnitOfWork::new(self.pool.clone())
    }

    /// A fresh unit of work, already open
    pub async fn begin(&self) -> Result<UnitOfWork, DatabaseError> {
        let mut uow = self.create();
        uow.open().await?;
        Ok(uow)
    }

    /// Runs `work` inside a freshly opened unit of work
    ///
    /// The closure decides whether to commit. If it returns an error while
    /// the unit of work is still open, the unit of work is rolled back. It is
    /// closed in every case before the closure's result is returned.
    pub async fn run<T, E, W>(&self, work: W) -> Result<T, E>
    where
        W: for<'u> FnOnce(&'u mut UnitOfWork) -> ScopedWork<'u, T, E>,
        E: From<DatabaseError>,
    {
        let mut uow = self.begin().await?;
        let outcome = work(&mut uow).await;

        if outcome.is_err() && uow.state() == UnitOfWorkState::Open {
            warn!(session_id = %uow.session_id(), "unit of work failed, rolling back");
            uow.rollback().await?;
        }
        uow.close().await;
        outcome
    }
}
