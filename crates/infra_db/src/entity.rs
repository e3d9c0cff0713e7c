//! Entity-to-table mapping consumed by the generic repository
//!
//! Table and column shapes come from the migrations; an `Entity`
//! implementation only names them and converts rows and shapes to values.

use std::fmt;

use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::specification::Column;
use crate::value::Value;

/// A record type persisted in one table
///
/// `Create` is the shape accepted by `create`, `Update` the partial shape
/// accepted by `update`, and `Field` the column enum that specifications over
/// this entity are written against.
pub trait Entity: Sized + Send + Sync + Unpin + 'static {
    type Id: Copy + fmt::Display + From<Uuid> + Into<Value> + Send + Sync;
    type Create: Send + Sync;
    type Update: Send + Sync;
    type Field: Column;

    /// Human-readable name used in errors and log fields
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Identity column, assigned by storage on insert
    const ID: Self::Field;
    /// Every column read back into the entity, in select order
    const COLUMNS: &'static [Self::Field];

    fn id(&self) -> Self::Id;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;

    /// Columns written on insert; omitted columns take their storage default
    fn insert_values(data: &Self::Create) -> Vec<(Self::Field, Value)>;

    /// Columns changed by a partial update; empty means nothing to change
    fn update_values(data: &Self::Update) -> Vec<(Self::Field, Value)>;
}
