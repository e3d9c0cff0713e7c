//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the catalog test
//! suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for items and users
//! - `builders`: Builders that produce unique, valid create shapes
//! - `database`: PostgreSQL test containers with the schema applied
//! - `assertions`: Assertions over the database error taxonomy
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
