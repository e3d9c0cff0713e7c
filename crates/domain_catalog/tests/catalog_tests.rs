//! Tests for the catalog domain shapes and validation

use core_kernel::UserId;
use domain_catalog::item::{ItemUpdate, NewItem, MAX_TITLE_LEN};
use domain_catalog::user::{NewUser, UserUpdate};
use domain_catalog::{validate, CatalogError};
use uuid::Uuid;

// ============================================================================
// Item Tests
// ============================================================================

mod item_tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = NewItem::new("Lamp");

        assert_eq!(item.title, "Lamp");
        assert!(item.description.is_none());
        assert!(item.is_active);
        assert!(item.owner_id.is_none());
    }

    #[test]
    fn test_new_item_builder_methods() {
        let owner = UserId::from_uuid(Uuid::new_v4());
        let item = NewItem::new("Lamp")
            .with_description("Brass")
            .owned_by(owner)
            .inactive();

        assert_eq!(item.description.as_deref(), Some("Brass"));
        assert_eq!(item.owner_id, Some(owner));
        assert!(!item.is_active);
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let result = validate(&NewItem::new(""));
        assert!(matches!(result, Err(CatalogError::Validation(_))));
    }

    #[test]
    fn test_title_length_limit() {
        let at_limit = "x".repeat(MAX_TITLE_LEN as usize);
        let over_limit = "x".repeat(MAX_TITLE_LEN as usize + 1);

        assert!(validate(&NewItem::new(at_limit)).is_ok());
        assert!(validate(&NewItem::new(over_limit)).is_err());
    }

    #[test]
    fn test_is_active_defaults_to_true_when_deserialized() {
        let item: NewItem = serde_json::from_str(r#"{"title":"Lamp","description":null,"owner_id":null}"#)
            .unwrap();
        assert!(item.is_active);
    }

    #[test]
    fn test_empty_update() {
        assert!(ItemUpdate::default().is_empty());

        let update = ItemUpdate { is_active: Some(false), ..Default::default() };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_update_title_validated_only_when_present() {
        assert!(validate(&ItemUpdate::default()).is_ok());

        let blank = ItemUpdate { title: Some(String::new()), ..Default::default() };
        assert!(validate(&blank).is_err());
    }
}

// ============================================================================
// User Tests
// ============================================================================

mod user_tests {
    use super::*;

    #[test]
    fn test_username_too_short() {
        let result = validate(&NewUser::new("ab"));
        match result {
            Err(CatalogError::Validation(msg)) => assert!(msg.contains("username")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_email_must_be_valid_when_present() {
        assert!(validate(&NewUser::new("alice")).is_ok());
        assert!(validate(&NewUser::new("alice").with_email("alice@example.com")).is_ok());
        assert!(validate(&NewUser::new("alice").with_email("not-an-email")).is_err());
    }

    #[test]
    fn test_user_update_is_empty() {
        assert!(UserUpdate::default().is_empty());
        let update = UserUpdate { email: Some("a@example.com".into()), ..Default::default() };
        assert!(!update.is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_nonblank_titles_within_limit_validate(title in "[a-zA-Z0-9 ]{1,255}") {
            prop_assert!(validate(&NewItem::new(title)).is_ok());
        }
    }
}
