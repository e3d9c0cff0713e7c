//! Repository and specification integration tests
//!
//! Each test starts its own PostgreSQL container and fails when no
//! container runtime is available.

use std::collections::BTreeSet;

use core_kernel::ItemId;
use domain_catalog::{Item, ItemUpdate, NewItem, UserUpdate};
use infra_db::repositories::item::{has_owner, is_active, owner_is, title_contains, title_is};
use infra_db::repositories::user::username_is;
use infra_db::specification::{and, not, or};
use infra_db::{Direction, ErrorKind, ItemField, Query, UnitOfWork};
use test_utils::assertions::{assert_conflict_on, assert_not_found};
use test_utils::{db_test, IdFixtures, TestItemBuilder, TestUserBuilder};

fn ids(items: &[Item]) -> BTreeSet<ItemId> {
    items.iter().map(|item| item.id).collect()
}

/// Creates three items: two active, one inactive; the first two owned
async fn seed(uow: &mut UnitOfWork) -> (Item, Item, Item) {
    let owner = uow.users().create(&TestUserBuilder::new().build()).await.unwrap();
    let mut items = uow.items();
    let a = items
        .create(&TestItemBuilder::new().titled_like("alpha").owned_by(owner.id).build())
        .await
        .unwrap();
    let b = items
        .create(&TestItemBuilder::new().titled_like("beta").owned_by(owner.id).inactive().build())
        .await
        .unwrap();
    let c = items
        .create(&TestItemBuilder::new().titled_like("gamma").build())
        .await
        .unwrap();
    (a, b, c)
}

mod crud {
    use super::*;

    db_test!(test_create_assigns_identity_and_defaults, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let item = uow.items().create(&NewItem::new("Lamp")).await.unwrap();

        assert_eq!(item.title, "Lamp");
        assert_eq!(item.description, None);
        assert!(item.is_active);
        assert_eq!(uow.items().get(item.id).await.unwrap(), Some(item));
        uow.close().await;
    });

    db_test!(test_get_missing_is_none, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        assert_eq!(uow.items().get(IdFixtures::missing_item_id()).await.unwrap(), None);
        assert!(!uow.items().exists(IdFixtures::missing_item_id()).await.unwrap());
        uow.close().await;
    });

    db_test!(test_partial_update_changes_only_given_fields, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let item = uow
            .items()
            .create(&NewItem::new("Lamp").with_description("Brass"))
            .await
            .unwrap();

        let update = ItemUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        let updated = uow.items().update(item.id, &update).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.title, "Lamp");
        assert_eq!(updated.description.as_deref(), Some("Brass"));
        assert_eq!(updated.created_at, item.created_at);

        let unchanged = uow.items().update(item.id, &ItemUpdate::default()).await.unwrap();
        assert_eq!(unchanged, updated);
        uow.close().await;
    });

    db_test!(test_update_missing_is_not_found, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let err = uow
            .users()
            .update(IdFixtures::missing_user_id(), &UserUpdate::default())
            .await
            .unwrap_err();
        assert_not_found(&err);
        assert!(err.to_string().starts_with("User with id 'USR-"));
        uow.close().await;
    });

    db_test!(test_delete_is_idempotent, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let item = uow.items().create(&TestItemBuilder::new().build()).await.unwrap();

        assert!(uow.items().delete(item.id).await.unwrap());
        assert!(!uow.items().delete(item.id).await.unwrap());
        assert_eq!(uow.items().get(item.id).await.unwrap(), None);
        uow.close().await;
    });

    db_test!(test_get_by_title_and_username, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let user = uow
            .users()
            .create(&TestUserBuilder::new().with_username("grace").build())
            .await
            .unwrap();
        let item = uow.items().create(&NewItem::new("Lamp")).await.unwrap();

        assert_eq!(uow.users().get_by_username("grace").await.unwrap(), Some(user));
        assert_eq!(uow.items().get_by_title("Lamp").await.unwrap(), Some(item));
        assert_eq!(uow.items().get_by_title("lamp").await.unwrap(), None);
        uow.close().await;
    });
}

mod constraints {
    use super::*;

    db_test!(test_unknown_owner_is_conflict, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let err = uow
            .items()
            .create(&TestItemBuilder::new().owned_by(IdFixtures::missing_user_id()).build())
            .await
            .unwrap_err();
        assert_conflict_on(&err, "items_owner_id_fkey");
        uow.close().await;
    });

    db_test!(test_deleting_an_owner_is_conflict, |db| {
        let factory = db.factory();
        let mut uow = factory.begin().await.unwrap();
        let owner = uow.users().create(&TestUserBuilder::new().build()).await.unwrap();
        uow.items()
            .create(&TestItemBuilder::new().owned_by(owner.id).build())
            .await
            .unwrap();
        uow.commit().await.unwrap();
        uow.close().await;

        let mut uow = factory.begin().await.unwrap();
        let err = uow.users().delete(owner.id).await.unwrap_err();
        assert_conflict_on(&err, "items_owner_id_fkey");
        uow.close().await;
    });

    db_test!(test_duplicate_username_is_conflict, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let user = TestUserBuilder::new().build();
        uow.users().create(&user).await.unwrap();
        let err = uow.users().create(&user).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.constraint(), Some("users_username_key"));
        assert!(!err.is_retryable());
        uow.close().await;
    });
}

mod specifications {
    use super::*;

    // Items owned by a user, and nothing else
    db_test!(test_owner_is_selects_owned_items, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let (a, b, _) = seed(&mut uow).await;
        let owner = a.owner_id.unwrap();

        let owned = uow.items().find_by_specification(owner_is(owner)).await.unwrap();
        assert_eq!(ids(&owned), ids(&[a.clone(), b.clone()]));

        let by_owner = uow.items().by_owner(owner, 0, 10).await.unwrap();
        assert_eq!(ids(&by_owner), ids(&[a, b]));
        assert_eq!(uow.items().by_owner(owner, 1, 10).await.unwrap().len(), 1);
        uow.close().await;
    });

    db_test!(test_and_is_commutative, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let (a, _, _) = seed(&mut uow).await;
        let owner = a.owner_id.unwrap();

        let left = uow
            .items()
            .find_by_specification(and(is_active(), owner_is(owner)))
            .await
            .unwrap();
        let right = uow
            .items()
            .find_by_specification(and(owner_is(owner), is_active()))
            .await
            .unwrap();
        assert_eq!(ids(&left), ids(&right));
        assert_eq!(ids(&left), ids(&[a]));
        uow.close().await;
    });

    db_test!(test_or_selects_union, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let (a, b, c) = seed(&mut uow).await;

        let found = uow
            .items()
            .find_by_specification(or(title_is(a.title.clone()), title_is(c.title.clone())))
            .await
            .unwrap();
        assert_eq!(ids(&found), ids(&[a, c]));
        assert!(!found.iter().any(|item| item.id == b.id));
        uow.close().await;
    });

    // Negation selects the complement, including rows where the column is null
    db_test!(test_not_selects_complement, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let (a, b, c) = seed(&mut uow).await;
        let owner = a.owner_id.unwrap();

        let others = uow
            .items()
            .find_by_specification(not(owner_is(owner)))
            .await
            .unwrap();
        assert_eq!(ids(&others), ids(&[c.clone()]));

        let unowned = uow.items().find_by_specification(!has_owner()).await.unwrap();
        assert_eq!(ids(&unowned), ids(&[c]));

        let twice = uow
            .items()
            .find_by_specification(not(not(owner_is(owner))))
            .await
            .unwrap();
        assert_eq!(ids(&twice), ids(&[a, b]));
        uow.close().await;
    });

    db_test!(test_title_contains_matches_literally, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let sale = uow.items().create(&NewItem::new("Summer 50% sale")).await.unwrap();
        uow.items().create(&NewItem::new("Summer 500 sale")).await.unwrap();

        let found = uow
            .items()
            .find_by_specification(title_contains("50%"))
            .await
            .unwrap();
        assert_eq!(found, vec![sale]);

        let insensitive = uow
            .items()
            .find_by_specification(title_contains("SUMMER"))
            .await
            .unwrap();
        assert_eq!(insensitive.len(), 2);
        uow.close().await;
    });

    db_test!(test_count_matches_find, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        seed(&mut uow).await;

        let spec = is_active() | !has_owner();
        let found = uow.items().find_by_specification(spec.clone()).await.unwrap();
        let count = uow.items().count_by_specification(&spec).await.unwrap();
        assert_eq!(count, found.len() as i64);
        assert_eq!(count, 2);
        assert_eq!(uow.items().count_all().await.unwrap(), 3);

        let users = uow
            .users()
            .count_by_specification(&username_is("nobody"))
            .await
            .unwrap();
        assert_eq!(users, 0);
        uow.close().await;
    });
}

mod paging {
    use super::*;

    db_test!(test_find_page_reports_total, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        for i in 0..5 {
            uow.items()
                .create(&NewItem::new(format!("item-{}", i)))
                .await
                .unwrap();
        }

        let query = Query::all()
            .order_by(ItemField::Title, Direction::Asc)
            .offset(2)
            .limit(2);
        let page = uow.items().find_page(query).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["item-2", "item-3"]);
        assert_eq!(page.total, 5);
        assert!(page.has_more());

        let last = uow
            .items()
            .find_page(
                Query::from(title_contains("item"))
                    .order_by(ItemField::Title, Direction::Desc)
                    .offset(4)
                    .limit(2),
            )
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title, "item-0");
        assert!(!last.has_more());
        uow.close().await;
    });

    db_test!(test_active_items_pages, |db| {
        let mut uow = db.factory().begin().await.unwrap();
        let (a, _, c) = seed(&mut uow).await;

        let active = uow.items().active_items(0, 10).await.unwrap();
        assert_eq!(ids(&active), ids(&[a, c]));
        let rest = uow.items().active_items(1, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0], active[1]);
        assert!(uow.items().active_items(0, 0).await.unwrap().is_empty());

        let first = uow
            .items()
            .find_one(is_active().order_by(ItemField::CreatedAt, Direction::Desc))
            .await
            .unwrap();
        assert!(first.is_some());
        uow.close().await;
    });
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::{Config, TestRunner};
    use test_utils::{
        item_id_strategy, new_item_strategy, new_user_strategy, user_id_strategy, TestDatabase,
    };

    // One container per test; every case runs in its own unit of work and rolls back.
    fn runner() -> TestRunner {
        TestRunner::new(Config::with_cases(16))
    }

    #[test]
    fn test_created_items_read_back_unchanged() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let db = rt.block_on(TestDatabase::start());
        let factory = db.factory();

        runner()
            .run(&new_item_strategy(), |new_item| {
                rt.block_on(async {
                    let mut uow = factory.begin().await.unwrap();
                    let created = uow.items().create(&new_item).await.unwrap();
                    prop_assert_eq!(&created.title, &new_item.title);
                    prop_assert_eq!(&created.description, &new_item.description);
                    prop_assert_eq!(created.is_active, new_item.is_active);
                    prop_assert_eq!(created.owner_id, new_item.owner_id);

                    let fetched = uow.items().get(created.id).await.unwrap();
                    prop_assert_eq!(fetched.as_ref(), Some(&created));
                    let by_title = uow.items().get_by_title(&new_item.title).await.unwrap();
                    prop_assert_eq!(by_title.map(|item| item.id), Some(created.id));

                    uow.rollback().await.unwrap();
                    uow.close().await;
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn test_created_users_read_back_unchanged() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let db = rt.block_on(TestDatabase::start());
        let factory = db.factory();

        runner()
            .run(&new_user_strategy(), |new_user| {
                rt.block_on(async {
                    let mut uow = factory.begin().await.unwrap();
                    let created = uow.users().create(&new_user).await.unwrap();
                    prop_assert_eq!(&created.username, &new_user.username);
                    prop_assert_eq!(&created.email, &new_user.email);

                    let fetched = uow.users().get_by_username(&new_user.username).await.unwrap();
                    prop_assert_eq!(fetched.as_ref(), Some(&created));

                    uow.rollback().await.unwrap();
                    uow.close().await;
                    Ok(())
                })
            })
            .unwrap();
    }

    /// Unknown ids read as absent, delete as no-ops, and leave the unit of work open
    #[test]
    fn test_unknown_ids_are_absent() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let db = rt.block_on(TestDatabase::start());
        let factory = db.factory();

        runner()
            .run(&(item_id_strategy(), user_id_strategy()), |(item_id, user_id)| {
                rt.block_on(async {
                    let mut uow = factory.begin().await.unwrap();
                    prop_assert_eq!(uow.items().get(item_id).await.unwrap(), None);
                    prop_assert!(!uow.items().exists(item_id).await.unwrap());
                    prop_assert!(!uow.items().delete(item_id).await.unwrap());
                    prop_assert!(!uow.users().exists(user_id).await.unwrap());
                    prop_assert!(!uow.users().delete(user_id).await.unwrap());
                    prop_assert_eq!(
                        uow.items().count_by_specification(&owner_is(user_id)).await.unwrap(),
                        0
                    );
                    prop_assert!(!uow.state().is_terminal());

                    uow.close().await;
                    Ok(())
                })
            })
            .unwrap();
    }
}
