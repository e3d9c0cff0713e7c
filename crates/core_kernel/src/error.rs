//! Kernel error type

use thiserror::Error;

/// Errors raised by kernel types
#[derive(Debug, Error)]
pub enum CoreError {
    /// Text that does not parse as an identifier of the expected kind
    #[error("Invalid {kind} identifier '{value}'")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
}

impl CoreError {
    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>, source: uuid::Error) -> Self {
        CoreError::InvalidIdentifier {
            kind,
            value: value.into(),
            source,
        }
    }
}
