//! Pre-built Test Fixtures
//!
//! Fixed, predictable data for tests. Titles and usernames here are
//! constants, so a test that inserts the same fixture twice sees a conflict;
//! use the builders when uniqueness matters.

use core_kernel::{ItemId, UserId};
use domain_catalog::item::PROTECTED_TITLE;
use domain_catalog::{NewItem, NewUser};
use uuid::Uuid;

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// An identity no row will ever have
    pub fn missing_item_id() -> ItemId {
        ItemId::from_uuid(Uuid::nil())
    }

    pub fn missing_user_id() -> UserId {
        UserId::from_uuid(Uuid::nil())
    }
}

/// Fixture for items
pub struct ItemFixtures;

impl ItemFixtures {
    pub fn new_lamp() -> NewItem {
        NewItem::new("Lamp").with_description("Brass desk lamp")
    }

    /// The item whose title protects it from deletion
    pub fn new_protected() -> NewItem {
        NewItem::new(PROTECTED_TITLE)
    }
}

/// Fixture for users
pub struct UserFixtures;

impl UserFixtures {
    pub fn new_ada() -> NewUser {
        NewUser::new("ada").with_email("ada@example.com")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_catalog::validate;

    #[test]
    fn test_missing_ids_are_nil() {
        assert!(IdFixtures::missing_item_id().as_uuid().is_nil());
        assert!(IdFixtures::missing_user_id().as_uuid().is_nil());
    }

    #[test]
    fn test_fixtures_validate() {
        assert!(validate(&ItemFixtures::new_lamp()).is_ok());
        assert!(validate(&ItemFixtures::new_protected()).is_ok());
        assert!(validate(&UserFixtures::new_ada()).is_ok());
    }
}
