//! Item table mapping, item specifications and item-specific queries

use core_kernel::{ItemId, UserId};
use domain_catalog::{Item, ItemUpdate, NewItem};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::DatabaseError;
use crate::repositories::BoundRepository;
use crate::specification::{escape_like, Column, Direction, Query, Specification};
use crate::value::Value;

/// Columns of the `items` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    Id,
    Title,
    Description,
    IsActive,
    OwnerId,
    CreatedAt,
}

impl Column for ItemField {
    fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Description => "description",
            Self::IsActive => "is_active",
            Self::OwnerId => "owner_id",
            Self::CreatedAt => "created_at",
        }
    }
}

impl Entity for Item {
    type Id = ItemId;
    type Create = NewItem;
    type Update = ItemUpdate;
    type Field = ItemField;

    const NAME: &'static str = "Item";
    const TABLE: &'static str = "items";
    const ID: ItemField = ItemField::Id;
    const COLUMNS: &'static [ItemField] = &[
        ItemField::Id,
        ItemField::Title,
        ItemField::Description,
        ItemField::IsActive,
        ItemField::OwnerId,
        ItemField::CreatedAt,
    ];

    fn id(&self) -> ItemId {
        self.id
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Item {
            id: ItemId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            is_active: row.try_get("is_active")?,
            owner_id: row
                .try_get::<Option<Uuid>, _>("owner_id")?
                .map(UserId::from_uuid),
            created_at: row.try_get("created_at")?,
        })
    }

    fn insert_values(data: &NewItem) -> Vec<(ItemField, Value)> {
        let mut values = vec![
            (ItemField::Title, Value::from(data.title.as_str())),
            (ItemField::IsActive, Value::from(data.is_active)),
        ];
        if let Some(description) = &data.description {
            values.push((ItemField::Description, description.as_str().into()));
        }
        if let Some(owner) = data.owner_id {
            values.push((ItemField::OwnerId, owner.into()));
        }
        values
    }

    fn update_values(data: &ItemUpdate) -> Vec<(ItemField, Value)> {
        let mut values = Vec::new();
        if let Some(title) = &data.title {
            values.push((ItemField::Title, title.as_str().into()));
        }
        if let Some(description) = &data.description {
            values.push((ItemField::Description, description.as_str().into()));
        }
        if let Some(is_active) = data.is_active {
            values.push((ItemField::IsActive, is_active.into()));
        }
        if let Some(owner) = data.owner_id {
            values.push((ItemField::OwnerId, owner.into()));
        }
        values
    }
}

/// Items owned by `owner`
pub fn owner_is(owner: UserId) -> Specification<ItemField> {
    Specification::eq(ItemField::OwnerId, owner)
}

/// Items whose title is exactly `title`
pub fn title_is(title: impl Into<String>) -> Specification<ItemField> {
    Specification::eq(ItemField::Title, title.into())
}

/// Items whose title contains `fragment`, ignoring case
///
/// `%` and `_` in the fragment match literally.
pub fn title_contains(fragment: &str) -> Specification<ItemField> {
    Specification::ilike(ItemField::Title, format!("%{}%", escape_like(fragment)))
}

pub fn is_active() -> Specification<ItemField> {
    Specification::eq(ItemField::IsActive, true)
}

pub fn has_owner() -> Specification<ItemField> {
    Specification::is_not_null(ItemField::OwnerId)
}

fn oldest_first(spec: Specification<ItemField>) -> Query<ItemField> {
    spec.order_by(ItemField::CreatedAt, Direction::Asc)
        .then_by(ItemField::Id, Direction::Asc)
}

impl<'u> BoundRepository<'u, Item> {
    /// Returns the item with this exact title, if any
    pub async fn get_by_title(&mut self, title: &str) -> Result<Option<Item>, DatabaseError> {
        self.find_one(title_is(title)).await
    }

    /// Active items, oldest first
    pub async fn active_items(&mut self, offset: i64, limit: i64) -> Result<Vec<Item>, DatabaseError> {
        self.find_by_specification(oldest_first(is_active()).offset(offset).limit(limit))
            .await
    }

    /// Items owned by `owner`, oldest first
    pub async fn by_owner(
        &mut self,
        owner: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Item>, DatabaseError> {
        self.find_by_specification(oldest_first(owner_is(owner)).offset(offset).limit(limit))
            .await
    }
}
