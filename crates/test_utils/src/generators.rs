//! Property-Based Test Generators
//!
//! Proptest strategies that produce data satisfying the catalog's
//! validation rules.

use core_kernel::{ItemId, UserId};
use domain_catalog::item::PROTECTED_TITLE;
use domain_catalog::{NewItem, NewUser};
use proptest::prelude::*;

/// Valid item titles, never the protected one
pub fn title_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _%-]{0,40}".prop_filter("protected title", |t| t != PROTECTED_TITLE)
}

/// Titles that fail validation
pub fn invalid_title_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z]{256,300}"]
}

pub fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{2,30}"
}

pub fn email_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{5,10}", "[a-z]{3,8}").prop_map(|(local, domain)| format!("{}@{}.com", local, domain))
}

pub fn item_id_strategy() -> impl Strategy<Value = ItemId> {
    any::<u128>().prop_map(|bits| ItemId::from_uuid(uuid::Uuid::from_u128(bits)))
}

pub fn user_id_strategy() -> impl Strategy<Value = UserId> {
    any::<u128>().prop_map(|bits| UserId::from_uuid(uuid::Uuid::from_u128(bits)))
}

/// Valid items without an owner, so they can be stored without seeding users
pub fn new_item_strategy() -> impl Strategy<Value = NewItem> {
    (
        title_strategy(),
        proptest::option::of("[a-z ]{0,80}"),
        any::<bool>(),
    )
        .prop_map(|(title, description, is_active)| NewItem {
            title,
            description,
            is_active,
            owner_id: None,
        })
}

pub fn new_user_strategy() -> impl Strategy<Value = NewUser> {
    (username_strategy(), proptest::option::of(email_strategy()))
        .prop_map(|(username, email)| NewUser { username, email })
}
