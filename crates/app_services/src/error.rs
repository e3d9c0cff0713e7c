//! Service error handling

use domain_catalog::CatalogError;
use infra_db::{DatabaseError, ErrorKind};
use thiserror::Error;

/// Errors returned by the catalog services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A unique field already holds this value
    #[error("{entity} with {field} '{value}' already exists")]
    AlreadyExists {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The entity is not in a state that allows the operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Database(e) if e.kind() == ErrorKind::NotFound)
    }

    /// Whether the same call may succeed if retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_retryable())
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) => Self::Validation(msg),
            CatalogError::ProtectedItem(_) => Self::Forbidden(err.to_string()),
            CatalogError::AlreadyPublished(_) => Self::InvalidOperation(err.to_string()),
        }
    }
}
