//! Catalog domain errors

use core_kernel::ItemId;
use thiserror::Error;

/// Business-rule failures raised by the catalog domain
///
/// These never come from storage; storage failures are translated by
/// `infra_db` into its own error taxonomy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Input failed field validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The item is protected from deletion
    #[error("Item '{0}' is protected and cannot be deleted")]
    ProtectedItem(String),

    /// Publishing an item that is already active
    #[error("Item {0} is already published")]
    AlreadyPublished(ItemId),
}
