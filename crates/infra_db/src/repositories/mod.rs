//! Generic repository over any [`Entity`]
//!
//! A [`Repository`] holds the SQL pre-rendered for one entity and the id of
//! the session it was created for. It never touches a connection on its own:
//! every call goes through a [`BoundRepository`], a short-lived handle that
//! borrows the owning unit of work's session mutably. That borrow is what
//! keeps a session to one in-flight operation at a time.
//!
//! Repositories never commit. Writes are staged in the session's transaction
//! and become durable only when the unit of work commits.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut uow = factory.begin().await?;
//! let item = uow.repository::<Item>().create(&NewItem::new("Lamp")).await?;
//! uow.commit().await?;
//! ```

pub mod item;
pub mod user;

use std::fmt::Write as _;
use std::marker::PhantomData;

use sqlx::{PgConnection, Row};
use tracing::debug;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::DatabaseError;
use crate::session::Session;
use crate::specification::{Column, Query, Specification};
use crate::value::{bind_all, Value};

pub use item::ItemField;
pub use user::UserField;

/// Pre-rendered statements for one entity, bound to one session
pub struct Repository<E: Entity> {
    session_id: Uuid,
    select: String,
    select_by_id: String,
    exists_by_id: String,
    delete_by_id: String,
    count: String,
    returning: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// Renders the statements for `E`; performs no I/O
    pub(crate) fn new(session_id: Uuid) -> Self {
        let columns = E::COLUMNS
            .iter()
            .map(Column::name)
            .collect::<Vec<_>>()
            .join(", ");
        let select = format!("SELECT {} FROM {}", columns, E::TABLE);
        let id = E::ID.name();

        Self {
            session_id,
            select_by_id: format!("{} WHERE {} = $1", select, id),
            exists_by_id: format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)", E::TABLE, id),
            delete_by_id: format!("DELETE FROM {} WHERE {} = $1", E::TABLE, id),
            count: format!("SELECT COUNT(*) FROM {}", E::TABLE),
            returning: format!(" RETURNING {}", columns),
            select,
            _entity: PhantomData,
        }
    }

    /// The session this repository was created for
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    async fn get(&self, conn: &mut PgConnection, id: E::Id) -> Result<Option<E>, DatabaseError> {
        let row = bind_all(sqlx::query(&self.select_by_id), vec![id.into()])
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(E::from_row).transpose().map_err(Into::into)
    }

    async fn exists(&self, conn: &mut PgConnection, id: E::Id) -> Result<bool, DatabaseError> {
        let row = bind_all(sqlx::query(&self.exists_by_id), vec![id.into()])
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.try_get::<bool, _>(0)?)
    }

    async fn create(&self, conn: &mut PgConnection, data: &E::Create) -> Result<E, DatabaseError> {
        let values = E::insert_values(data);
        let mut sql = format!("INSERT INTO {}", E::TABLE);
        if values.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            let columns: Vec<&str> = values.iter().map(|(field, _)| field.name()).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${}", i)).collect();
            let _ = write!(
                sql,
                " ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );
        }
        sql.push_str(&self.returning);
        debug!(entity = E::NAME, %sql, "insert");

        let params = values.into_iter().map(|(_, value)| value).collect();
        let row = bind_all(sqlx::query(&sql), params)
            .fetch_one(&mut *conn)
            .await?;
        Ok(E::from_row(&row)?)
    }

    async fn update(
        &self,
        conn: &mut PgConnection,
        id: E::Id,
        data: &E::Update,
    ) -> Result<E, DatabaseError> {
        let values = E::update_values(data);
        if values.is_empty() {
            return self
                .get(conn, id)
                .await?
                .ok_or_else(|| DatabaseError::not_found(E::NAME, id));
        }

        let assignments: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ${}", field.name(), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}{}",
            E::TABLE,
            assignments.join(", "),
            E::ID.name(),
            values.len() + 1,
            self.returning
        );
        debug!(entity = E::NAME, %sql, "update");

        let mut params: Vec<Value> = values.into_iter().map(|(_, value)| value).collect();
        params.push(id.into());
        let row = bind_all(sqlx::query(&sql), params)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DatabaseError::not_found(E::NAME, id))?;
        Ok(E::from_row(&row)?)
    }

    async fn delete(&self, conn: &mut PgConnection, id: E::Id) -> Result<bool, DatabaseError> {
        let result = bind_all(sqlx::query(&self.delete_by_id), vec![id.into()])
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        conn: &mut PgConnection,
        query: &Query<E::Field>,
    ) -> Result<Vec<E>, DatabaseError> {
        let (sql, params) = query.render(&self.select);
        debug!(entity = E::NAME, %sql, "select");

        let rows = bind_all(sqlx::query(&sql), params)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter()
            .map(E::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn count(
        &self,
        conn: &mut PgConnection,
        spec: Option<&Specification<E::Field>>,
    ) -> Result<i64, DatabaseError> {
        let mut sql = self.count.clone();
        let mut params = Vec::new();
        if let Some(spec) = spec {
            let filter = spec.to_filter(1);
            sql.push_str(" WHERE ");
            sql.push_str(&filter.clause);
            params = filter.params;
        }

        let row = bind_all(sqlx::query(&sql), params)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

/// One page of results with the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: i64,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl<E> Page<E> {
    /// Whether rows exist past this page
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len() as i64) < self.total
    }
}

/// A repository bound to the session of the unit of work that handed it out
///
/// Storage failures (conflict, connection, persistence) roll the unit of work
/// back before they are returned. A missing row leaves it open.
pub struct BoundRepository<'u, E: Entity> {
    repository: &'u Repository<E>,
    session: &'u mut Session,
}

impl<'u, E: Entity> BoundRepository<'u, E> {
    pub(crate) fn new(repository: &'u Repository<E>, session: &'u mut Session) -> Self {
        debug_assert_eq!(repository.session_id(), session.id());
        Self { repository, session }
    }

    /// The memoized repository behind this handle
    pub fn repository(&self) -> &Repository<E> {
        self.repository
    }

    /// Returns the entity with this identity, or `None` if absent
    pub async fn get(&mut self, id: E::Id) -> Result<Option<E>, DatabaseError> {
        let conn = self.session.connection("query")?;
        let result = self.repository.get(conn, id).await;
        self.session.settle(result).await
    }

    pub async fn exists(&mut self, id: E::Id) -> Result<bool, DatabaseError> {
        let conn = self.session.connection("query")?;
        let result = self.repository.exists(conn, id).await;
        self.session.settle(result).await
    }

    /// Inserts a new entity and returns it with its storage-assigned identity
    pub async fn create(&mut self, data: &E::Create) -> Result<E, DatabaseError> {
        let conn = self.session.connection("write")?;
        let result = self.repository.create(conn, data).await;
        self.session.settle(result).await
    }

    /// Applies a partial update
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no entity has this identity
    pub async fn update(&mut self, id: E::Id, data: &E::Update) -> Result<E, DatabaseError> {
        let conn = self.session.connection("write")?;
        let result = self.repository.update(conn, id, data).await;
        self.session.settle(result).await
    }

    /// Removes the entity; returns whether a row was removed
    ///
    /// Deleting an absent identity is not an error.
    pub async fn delete(&mut self, id: E::Id) -> Result<bool, DatabaseError> {
        let conn = self.session.connection("write")?;
        let result = self.repository.delete(conn, id).await;
        self.session.settle(result).await
    }

    /// Returns every entity matching the query
    ///
    /// Rows come back in storage order unless the query orders them.
    pub async fn find_by_specification(
        &mut self,
        query: impl Into<Query<E::Field>>,
    ) -> Result<Vec<E>, DatabaseError> {
        let query = query.into();
        let conn = self.session.connection("query")?;
        let result = self.repository.find(conn, &query).await;
        self.session.settle(result).await
    }

    /// Returns the first match, if any
    pub async fn find_one(
        &mut self,
        query: impl Into<Query<E::Field>>,
    ) -> Result<Option<E>, DatabaseError> {
        let query = query.into().limit(1);
        let found = self.find_by_specification(query).await?;
        Ok(found.into_iter().next())
    }

    pub async fn find_all(&mut self) -> Result<Vec<E>, DatabaseError> {
        self.find_by_specification(Query::all()).await
    }

    pub async fn count_by_specification(
        &mut self,
        spec: &Specification<E::Field>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.session.connection("query")?;
        let result = self.repository.count(conn, Some(spec)).await;
        self.session.settle(result).await
    }

    pub async fn count_all(&mut self) -> Result<i64, DatabaseError> {
        let conn = self.session.connection("query")?;
        let result = self.repository.count(conn, None).await;
        self.session.settle(result).await
    }

    /// Returns one page of matches together with the total match count
    pub async fn find_page(
        &mut self,
        query: impl Into<Query<E::Field>>,
    ) -> Result<Page<E>, DatabaseError> {
        let query = query.into();
        let total = match query.specification() {
            Some(spec) => self.count_by_specification(spec).await?,
            None => self.count_all().await?,
        };
        let offset = query.offset_value().unwrap_or(0);
        let limit = query.limit_value();
        let items = self.find_by_specification(query).await?;
        Ok(Page {
            items,
            total,
            offset,
            limit,
        })
    }
}
