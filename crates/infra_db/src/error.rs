//! Database error taxonomy and the storage error translator
//!
//! Every failure that comes out of SQLx passes through [`translate`] before it
//! reaches a caller, so code above this crate only ever sees the five kinds in
//! [`DatabaseError`]. Classification follows PostgreSQL SQLSTATE codes:
//! <https://www.postgresql.org/docs/current/errcodes-appendix.html>

use thiserror::Error;
use tracing::debug;

use crate::session::UnitOfWorkState;

/// Errors surfaced by repositories and units of work
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The requested entity does not exist
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },

    /// A write violated a uniqueness, foreign key, check or not-null constraint
    #[error("Constraint violation{}: {message}", constraint_suffix(.constraint))]
    Conflict {
        constraint: Option<String>,
        message: String,
    },

    /// The pool could not supply a connection, or the connection was lost
    #[error("Database connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A unit of work was driven outside its state machine
    #[error("Cannot {operation} a unit of work in state {state}")]
    InvalidState {
        operation: &'static str,
        state: UnitOfWorkState,
    },

    /// Any other storage failure
    #[error("Persistence failure: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    constraint
        .as_ref()
        .map(|name| format!(" on '{}'", name))
        .unwrap_or_default()
}

/// The kind of a [`DatabaseError`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Connection,
    InvalidState,
    Persistence,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Item", "ITM-123");
    /// assert!(error.to_string().contains("Item"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: UnitOfWorkState) -> Self {
        DatabaseError::InvalidState { operation, state }
    }

    /// Returns the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::NotFound { .. } => ErrorKind::NotFound,
            DatabaseError::Conflict { .. } => ErrorKind::Conflict,
            DatabaseError::Connection { .. } => ErrorKind::Connection,
            DatabaseError::InvalidState { .. } => ErrorKind::InvalidState,
            DatabaseError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_connection_error(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Name of the violated constraint, when storage reported one
    pub fn constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::Conflict { constraint, .. } => constraint.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure left the transaction unusable
    ///
    /// Storage-originated failures abort a PostgreSQL transaction; a missing
    /// row or a state-machine misuse does not.
    pub fn aborts_transaction(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::Connection | ErrorKind::Persistence
        )
    }

    /// Whether re-running the whole unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::Connection { .. } => true,
            DatabaseError::Persistence {
                source: Some(sqlx::Error::Database(db_err)),
                ..
            } => matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
            ),
            _ => false,
        }
    }
}

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Storage-level category of a database-reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCategory {
    ConstraintViolation,
    ConnectionFailure,
    Other,
}

/// Classifies a PostgreSQL SQLSTATE code
///
/// Class 23 is integrity constraint violation; class 08 and the 57P0x /
/// 53300 codes mean the server dropped or refused the connection.
pub fn classify_sqlstate(code: &str) -> StorageCategory {
    match code {
        c if c.starts_with("23") => StorageCategory::ConstraintViolation,
        c if c.starts_with("08") => StorageCategory::ConnectionFailure,
        "57P01" | "57P02" | "57P03" | "53300" => StorageCategory::ConnectionFailure,
        _ => StorageCategory::Other,
    }
}

/// Translates a SQLx error into the domain taxonomy
///
/// Never swallows: every input yields exactly one `DatabaseError`, and the
/// original error is kept as the source where the kind carries one.
pub fn translate(error: sqlx::Error) -> DatabaseError {
    let translated = match error {
        sqlx::Error::RowNotFound => DatabaseError::NotFound {
            entity: "Record".to_string(),
            id: "unknown".to_string(),
        },
        sqlx::Error::PoolTimedOut => DatabaseError::Connection {
            message: "connection pool exhausted: timed out waiting for a connection".to_string(),
            source: Some(error),
        },
        sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => DatabaseError::Connection {
            message: error.to_string(),
            source: Some(error),
        },
        sqlx::Error::Database(ref db_err) => {
            let category = db_err.code().as_deref().map(classify_sqlstate);
            let constraint = db_err.constraint().map(str::to_string);
            let message = db_err.message().to_string();
            match category {
                Some(StorageCategory::ConstraintViolation) => {
                    DatabaseError::Conflict { constraint, message }
                }
                Some(StorageCategory::ConnectionFailure) => DatabaseError::Connection {
                    message,
                    source: Some(error),
                },
                _ => DatabaseError::Persistence {
                    message,
                    source: Some(error),
                },
            }
        }
        other => DatabaseError::Persistence {
            message: other.to_string(),
            source: Some(other),
        },
    };

    debug!(kind = ?translated.kind(), error = %translated, "translated storage error");
    translated
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        translate(error)
    }
}
