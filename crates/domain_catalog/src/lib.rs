//! Catalog Domain
//!
//! Plain records for the two entities the service persists, together with the
//! shapes used to create and partially update them.
//!
//! - **Item**: a titled catalog entry, optionally owned by a user
//! - **User**: an account that can own items
//!
//! Identity fields are assigned by storage; nothing in this crate generates
//! them. Persistence lives in `infra_db`, which maps these records onto tables.
//!
//! # Examples
//!
//! ```rust
//! use domain_catalog::item::NewItem;
//! use validator::Validate;
//!
//! let draft = NewItem::new("Lamp").with_description("Brass desk lamp").inactive();
//! assert!(draft.validate().is_ok());
//! assert!(!draft.is_active);
//! ```

pub mod error;
pub mod item;
pub mod user;
pub mod validation;

pub use error::CatalogError;
pub use item::{Item, ItemUpdate, NewItem};
pub use user::{NewUser, User, UserUpdate};
pub use validation::validate;
