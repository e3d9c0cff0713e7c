//! User operations

use core_kernel::UserId;
use domain_catalog::{validate, NewUser, User, UserUpdate};
use infra_db::{DatabaseError, Direction, Page, Query, UnitOfWorkFactory, UserField};
use tracing::{info, instrument};

use crate::error::ServiceError;

const USERNAME_CONSTRAINT: &str = "users_username_key";

#[derive(Debug, Clone)]
pub struct UserService {
    factory: UnitOfWorkFactory,
}

impl UserService {
    pub fn new(factory: UnitOfWorkFactory) -> Self {
        Self { factory }
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let user = uow
                        .users()
                        .get(id)
                        .await?
                        .ok_or_else(|| DatabaseError::not_found("User", id))?;
                    Ok::<_, ServiceError>(user)
                })
            })
            .await
    }

    /// Lists users ordered by username
    #[instrument(skip(self))]
    pub async fn list_users(&self, offset: i64, limit: i64) -> Result<Page<User>, ServiceError> {
        let query = Query::all()
            .order_by(UserField::Username, Direction::Asc)
            .offset(offset)
            .limit(limit);

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    let page = uow.users().find_page(query).await?;
                    Ok::<_, ServiceError>(page)
                })
            })
            .await
    }

    #[instrument(skip(self, data), fields(username = %data.username))]
    pub async fn create_user(&self, data: NewUser) -> Result<User, ServiceError> {
        validate(&data)?;

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    if uow.users().get_by_username(&data.username).await?.is_some() {
                        return Err(username_taken(&data.username));
                    }
                    let user = uow
                        .users()
                        .create(&data)
                        .await
                        .map_err(|e| username_conflict(e, &data.username))?;
                    uow.commit()
                        .await
                        .map_err(|e| username_conflict(e, &data.username))?;
                    info!(user_id = %user.id, "user created");
                    Ok::<_, ServiceError>(user)
                })
            })
            .await
    }

    #[instrument(skip(self, update), fields(user_id = %id))]
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, ServiceError> {
        validate(&update)?;

        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    if let Some(username) = update.username.as_deref() {
                        let holder = uow.users().get_by_username(username).await?;
                        if holder.is_some_and(|user| user.id != id) {
                            return Err(username_taken(username));
                        }
                    }
                    let username = update.username.clone().unwrap_or_default();
                    let user = uow
                        .users()
                        .update(id, &update)
                        .await
                        .map_err(|e| username_conflict(e, &username))?;
                    uow.commit()
                        .await
                        .map_err(|e| username_conflict(e, &username))?;
                    Ok::<_, ServiceError>(user)
                })
            })
            .await
    }

    /// Deletes a user; users that still own items cannot be deleted
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` (wrapped) if no user has this id
    /// - `DatabaseError::Conflict` (wrapped) if the user owns items
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        self.factory
            .run(move |uow| {
                Box::pin(async move {
                    if !uow.users().delete(id).await? {
                        return Err(ServiceError::from(DatabaseError::not_found("User", id)));
                    }
                    uow.commit().await?;
                    info!("user deleted");
                    Ok::<_, ServiceError>(())
                })
            })
            .await
    }
}

fn username_taken(username: &str) -> ServiceError {
    ServiceError::AlreadyExists {
        entity: "User",
        field: "username",
        value: username.to_string(),
    }
}

fn username_conflict(error: DatabaseError, username: &str) -> ServiceError {
    match error.constraint() {
        Some(USERNAME_CONSTRAINT) => username_taken(username),
        _ => error.into(),
    }
}
