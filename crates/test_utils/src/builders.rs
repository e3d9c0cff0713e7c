//! Test Data Builders
//!
//! Builders that produce valid create shapes with unique titles and
//! usernames, so tests can insert many rows without tripping the unique
//! constraints. Tests set only the fields they care about.

use core_kernel::UserId;
use domain_catalog::{NewItem, NewUser};
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use uuid::Uuid;

fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Builder for [`NewItem`]
pub struct TestItemBuilder {
    title: String,
    description: Option<String>,
    is_active: bool,
    owner_id: Option<UserId>,
}

impl Default for TestItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestItemBuilder {
    /// An active, unowned item with a unique title
    pub fn new() -> Self {
        let word: String = Word().fake();
        Self {
            title: format!("{}-{}", word, unique_suffix()),
            description: Some(Sentence(3..8).fake()),
            is_active: true,
            owner_id: None,
        }
    }

    /// Prefixes the generated title, keeping it unique
    pub fn titled_like(mut self, prefix: &str) -> Self {
        self.title = format!("{}-{}", prefix, unique_suffix());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn owned_by(mut self, owner: UserId) -> Self {
        self.owner_id = Some(owner);
        self
    }

    pub fn build(self) -> NewItem {
        NewItem {
            title: self.title,
            description: self.description,
            is_active: self.is_active,
            owner_id: self.owner_id,
        }
    }
}

/// Builder for [`NewUser`]
pub struct TestUserBuilder {
    username: String,
    email: Option<String>,
}

impl Default for TestUserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestUserBuilder {
    /// A user with a unique username and a safe email address
    pub fn new() -> Self {
        let name: String = Username().fake();
        Self {
            username: format!("{}_{}", name, unique_suffix()),
            email: Some(SafeEmail().fake()),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn build(self) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
        }
    }
}
