//! Item operations
//!
//! Each call runs in its own unit of work and commits only when every rule
//! holds; any error leaves the database untouched.

use core_kernel::{ItemId, UserId};
use domain_catalog::{validate, Item, ItemUpdate, NewItem};
use infra_db::repositories::item::is_active;
use infra_db::{
    DatabaseError, Direction, ItemField, Page, Query, UnitOfWork, UnitOfWorkFactory,
};
use tracing::{info, instrument};

use crate::error::ServiceError;

const TITLE_CONSTRAINT: &str = "items_title_key";

#[derive(Debug, Clone)]
pub struct ItemService {
    factory: UnitOfWorkFactory,
}

impl ItemService {
    pub fn new(factory: UnitOfWorkFactory) -> Self {
        Self { factory }
    }

    /// # Errors
    ///
    /// `DatabaseError::NotFound` (wrapped) if no item has this id
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let item = load_item(uow, id).await?;
                    Ok::<_, ServiceError>(item)
                })
            })
            .await
    }

    /// Lists items oldest first, optionally only the active ones
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        active_only: bool,
        offset: i64,
        limit: i64,
    ) -> Result<Page<Item>, ServiceError> {
        let query = if active_only {
            Query::from(is_active())
        } else {
            Query::all()
        };
        let query = query
            .order_by(ItemField::CreatedAt, Direction::Asc)
            .then_by(ItemField::Id, Direction::Asc)
            .offset(offset)
            .limit(limit);

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let page = uow.items().find_page(query).await?;
                    Ok::<_, ServiceError>(page)
                })
            })
            .await
    }

    /// Creates an item with a title no other item has
    #[instrument(skip(self, data), fields(title = %data.title))]
    pub async fn create_item(&self, data: NewItem) -> Result<Item, ServiceError> {
        validate(&data)?;

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    ensure_title_free(uow, &data.title).await?;
                    let item = uow
                        .items()
                        .create(&data)
                        .await
                        .map_err(|e| title_conflict(e, &data.title))?;
                    uow.commit().await.map_err(|e| title_conflict(e, &data.title))?;
                    info!(item_id = %item.id, "item created");
                    Ok::<_, ServiceError>(item)
                })
            })
            .await
    }

    /// Applies a partial update; a new title must be free
    #[instrument(skip(self, update), fields(item_id = %id))]
    pub async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<Item, ServiceError> {
        validate(&update)?;

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let current = load_item(uow, id).await?;
                    if let Some(title) = update.title.as_deref().filter(|_| current.renames(&update)) {
                        ensure_title_free(uow, title).await?;
                    }
                    let title = update.title.clone().unwrap_or_default();
                    let item = uow
                        .items()
                        .update(id, &update)
                        .await
                        .map_err(|e| title_conflict(e, &title))?;
                    uow.commit().await.map_err(|e| title_conflict(e, &title))?;
                    Ok::<_, ServiceError>(item)
                })
            })
            .await
    }

    /// Deletes an item unless it is protected
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete_item(&self, id: ItemId) -> Result<(), ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let item = load_item(uow, id).await?;
                    item.ensure_deletable()?;
                    uow.items().delete(id).await?;
                    uow.commit().await?;
                    info!("item deleted");
                    Ok::<_, ServiceError>(())
                })
            })
            .await
    }

    /// Activates an inactive item
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn publish_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let item = load_item(uow, id).await?;
                    let publish = item.publish()?;
                    let item = uow.items().update(id, &publish).await?;
                    uow.commit().await?;
                    info!("item published");
                    Ok::<_, ServiceError>(item)
                })
            })
            .await
    }

    /// Items owned by an existing user
    #[instrument(skip(self), fields(user_id = %owner))]
    pub async fn items_by_owner(
        &self,
        owner: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Item>, ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    ensure_user_exists(uow, owner).await?;
                    let items = uow.items().by_owner(owner, offset, limit).await?;
                    Ok::<_, ServiceError>(items)
                })
            })
            .await
    }

    /// Transfers an item to an existing user
    #[instrument(skip(self), fields(item_id = %id, user_id = %owner))]
    pub async fn assign_owner(&self, id: ItemId, owner: UserId) -> Result<Item, ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    ensure_user_exists(uow, owner).await?;
                    let update = ItemUpdate {
                        owner_id: Some(owner),
                        ..ItemUpdate::default()
                    };
                    let item = uow.items().update(id, &update).await?;
                    uow.commit().await?;
                    Ok::<_, ServiceError>(item)
                })
            })
            .await
    }
}

async fn load_item(uow: &mut UnitOfWork, id: ItemId) -> Result<Item, ServiceError> {
    uow.items()
        .get(id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Item", id).into())
}

async fn ensure_user_exists(uow: &mut UnitOfWork, id: UserId) -> Result<(), ServiceError> {
    if uow.users().exists(id).await? {
        Ok(())
    } else {
        Err(DatabaseError::not_found("User", id).into())
    }
}

async fn ensure_title_free(uow: &mut UnitOfWork, title: &str) -> Result<(), ServiceError> {
    match uow.items().get_by_title(title).await? {
        Some(_) => Err(already_exists(title)),
        None => Ok(()),
    }
}

fn already_exists(title: &str) -> ServiceError {
    ServiceError::AlreadyExists {
        entity: "Item",
        field: "title",
        value: title.to_string(),
    }
}

/// A concurrent insert can still win the race past `ensure_title_free`
fn title_conflict(error: DatabaseError, title: &str) -> ServiceError {
    match error.constraint() {
        Some(TITLE_CONSTRAINT) => already_exists(title),
        _ => error.into(),
    }
}
