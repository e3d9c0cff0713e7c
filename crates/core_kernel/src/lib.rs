//! Core Kernel - Foundational types for the catalog service
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed entity identifiers
//! - The kernel error type

pub mod identifiers;
pub mod error;

pub use identifiers::{ItemId, UserId};
pub use error::CoreError;
