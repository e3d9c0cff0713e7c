//! Item records and their lifecycle rules

use chrono::{DateTime, Utc};
use core_kernel::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CatalogError;

/// Title reserved for the seed item every catalog ships with
pub const PROTECTED_TITLE: &str = "default";

/// Maximum title length, matching the `VARCHAR(255)` column
pub const MAX_TITLE_LEN: u64 = 255;

/// A persisted catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Unique across the catalog
    pub title: String,
    pub description: Option<String>,
    /// Inactive items are drafts; publishing activates them
    pub is_active: bool,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Checks the deletion rule for this item
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProtectedItem` for the seed item
    pub fn ensure_deletable(&self) -> Result<(), CatalogError> {
        if self.title == PROTECTED_TITLE {
            return Err(CatalogError::ProtectedItem(self.title.clone()));
        }
        Ok(())
    }

    /// Checks that the item can be published and returns the update that does it
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::AlreadyPublished` if the item is already active
    pub fn publish(&self) -> Result<ItemUpdate, CatalogError> {
        if self.is_active {
            return Err(CatalogError::AlreadyPublished(self.id));
        }
        Ok(ItemUpdate {
            is_active: Some(true),
            ..ItemUpdate::default()
        })
    }

    /// Returns true if the item belongs to `user`
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == Some(user)
    }

    /// Returns true if applying `update` would change the title
    pub fn renames(&self, update: &ItemUpdate) -> bool {
        update
            .title
            .as_deref()
            .is_some_and(|title| title != self.title)
    }
}

fn default_active() -> bool {
    true
}

/// Data for creating a new item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewItem {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub owner_id: Option<UserId>,
}

impl NewItem {
    /// Creates an active, unowned item with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            is_active: true,
            owner_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn owned_by(mut self, owner: UserId) -> Self {
        self.owner_id = Some(owner);
        self
    }

    /// Marks the item as a draft
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update for an item
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ItemUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub owner_id: Option<UserId>,
}

impl ItemUpdate {
    /// Returns true if no field would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.owner_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn stored(title: &str, is_active: bool) -> Item {
        Item {
            id: ItemId::from_uuid(Uuid::new_v4()),
            title: title.to_string(),
            description: None,
            is_active,
            owner_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_protected_item_cannot_be_deleted() {
        let item = stored(PROTECTED_TITLE, true);
        assert_eq!(
            item.ensure_deletable(),
            Err(CatalogError::ProtectedItem("default".to_string()))
        );
        assert!(stored("lamp", true).ensure_deletable().is_ok());
    }

    #[test]
    fn test_publish_requires_inactive_item() {
        let draft = stored("lamp", false);
        let update = draft.publish().unwrap();
        assert_eq!(update.is_active, Some(true));
        assert!(update.title.is_none());

        let live = stored("lamp", true);
        assert_eq!(live.publish(), Err(CatalogError::AlreadyPublished(live.id)));
    }

    #[test]
    fn test_renames_ignores_same_title() {
        let item = stored("lamp", true);
        let same = ItemUpdate { title: Some("lamp".into()), ..Default::default() };
        let other = ItemUpdate { title: Some("desk".into()), ..Default::default() };

        assert!(!item.renames(&same));
        assert!(item.renames(&other));
        assert!(!item.renames(&ItemUpdate::default()));
    }
}
