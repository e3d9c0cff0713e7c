//! User table mapping and user specifications

use core_kernel::UserId;
use domain_catalog::{NewUser, User, UserUpdate};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::entity::Entity;
use crate::error::DatabaseError;
use crate::repositories::BoundRepository;
use crate::specification::{Column, Specification};
use crate::value::Value;

/// Columns of the `users` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Id,
    Username,
    Email,
    CreatedAt,
}

impl Column for UserField {
    fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
        }
    }
}

impl Entity for User {
    type Id = UserId;
    type Create = NewUser;
    type Update = UserUpdate;
    type Field = UserField;

    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";
    const ID: UserField = UserField::Id;
    const COLUMNS: &'static [UserField] = &[
        UserField::Id,
        UserField::Username,
        UserField::Email,
        UserField::CreatedAt,
    ];

    fn id(&self) -> UserId {
        self.id
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(User {
            id: UserId::from_uuid(row.try_get("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn insert_values(data: &NewUser) -> Vec<(UserField, Value)> {
        let mut values = vec![(UserField::Username, Value::from(data.username.as_str()))];
        if let Some(email) = &data.email {
            values.push((UserField::Email, email.as_str().into()));
        }
        values
    }

    fn update_values(data: &UserUpdate) -> Vec<(UserField, Value)> {
        let mut values = Vec::new();
        if let Some(username) = &data.username {
            values.push((UserField::Username, username.as_str().into()));
        }
        if let Some(email) = &data.email {
            values.push((UserField::Email, email.as_str().into()));
        }
        values
    }
}

pub fn username_is(username: impl Into<String>) -> Specification<UserField> {
    Specification::eq(UserField::Username, username.into())
}

pub fn email_is(email: impl Into<String>) -> Specification<UserField> {
    Specification::eq(UserField::Email, email.into())
}

impl<'u> BoundRepository<'u, User> {
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, DatabaseError> {
        self.find_one(username_is(username)).await
    }
}
