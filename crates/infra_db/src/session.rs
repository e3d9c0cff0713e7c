//! Transactional session owned by a unit of work
//!
//! A session wraps at most one database transaction and tracks where the
//! owning unit of work is in its lifecycle:
//!
//! ```text
//! Created --open--> Open --commit--> Committed --close--> Closed
//!                     |                                     ^
//!                     +--rollback / storage failure--> RolledBack
//! ```
//!
//! Closing an open session rolls it back first. Dropping one does the same,
//! since SQLx rolls back a transaction that is dropped without a commit.
//!
//! While open, a session can stack savepoints on its transaction. A storage
//! failure inside a savepoint rolls back to the innermost savepoint instead
//! of aborting the whole transaction.

use std::fmt;

use sqlx::{Executor, PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{translate, DatabaseError};

/// Lifecycle state of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    Created,
    Open,
    Committed,
    RolledBack,
    Closed,
}

impl UnitOfWorkState {
    /// Whether no further transitions other than close are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Closed)
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A transaction plus the state machine around it
pub struct Session {
    id: Uuid,
    state: UnitOfWorkState,
    transaction: Option<Transaction<'static, Postgres>>,
    /// Savepoints currently established on the transaction
    savepoints: usize,
}

fn savepoint_name(depth: usize) -> String {
    format!("uow_savepoint_{}", depth)
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: UnitOfWorkState::Created,
            transaction: None,
            savepoints: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    pub fn savepoint_depth(&self) -> usize {
        self.savepoints
    }

    /// Acquires a connection and begins a transaction
    pub(crate) async fn begin(&mut self, pool: &PgPool) -> Result<(), DatabaseError> {
        if self.state != UnitOfWorkState::Created {
            return Err(DatabaseError::invalid_state("open", self.state));
        }

        let transaction = pool.begin().await.map_err(translate)?;
        self.transaction = Some(transaction);
        self.state = UnitOfWorkState::Open;
        debug!(session_id = %self.id, "unit of work opened");
        Ok(())
    }

    /// The transaction's connection, available only while open
    pub(crate) fn connection(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut PgConnection, DatabaseError> {
        let state = self.state;
        match self.transaction.as_mut() {
            Some(transaction) if state == UnitOfWorkState::Open => Ok(&mut **transaction),
            _ => Err(DatabaseError::invalid_state(operation, state)),
        }
    }

    pub(crate) async fn commit(&mut self) -> Result<(), DatabaseError> {
        let transaction = match (self.state, self.transaction.take()) {
            (UnitOfWorkState::Open, Some(transaction)) => transaction,
            (state, transaction) => {
                self.transaction = transaction;
                return Err(DatabaseError::invalid_state("commit", state));
            }
        };
        // COMMIT ends every savepoint along with the transaction.
        self.savepoints = 0;

        match transaction.commit().await {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                info!(session_id = %self.id, "unit of work committed");
                Ok(())
            }
            Err(source) => {
                // The transaction was consumed; the server has discarded it.
                self.state = UnitOfWorkState::RolledBack;
                let error = translate(source);
                warn!(session_id = %self.id, %error, "commit failed, unit of work rolled back");
                Err(error)
            }
        }
    }

    /// Discards pending changes
    ///
    /// Rolling back twice is a no-op. Storage failures while rolling back are
    /// logged, never returned: the server discards the transaction when the
    /// connection goes away either way.
    pub(crate) async fn rollback(&mut self) -> Result<(), DatabaseError> {
        match self.state {
            UnitOfWorkState::RolledBack => Ok(()),
            UnitOfWorkState::Open => {
                if let Some(transaction) = self.transaction.take() {
                    if let Err(error) = transaction.rollback().await {
                        warn!(session_id = %self.id, %error, "rollback failed");
                    }
                }
                self.savepoints = 0;
                self.state = UnitOfWorkState::RolledBack;
                info!(session_id = %self.id, "unit of work rolled back");
                Ok(())
            }
            state => Err(DatabaseError::invalid_state("roll back", state)),
        }
    }

    /// Rolls back when a storage failure escaped an operation
    ///
    /// Inside a savepoint only the work since the innermost savepoint is
    /// discarded and the session stays open.
    pub(crate) async fn settle<T>(
        &mut self,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        if let Err(error) = &result {
            if error.aborts_transaction() && self.state == UnitOfWorkState::Open {
                if self.savepoints > 0 {
                    warn!(session_id = %self.id, %error, "operation failed, rolling back to savepoint");
                    self.restore_savepoint().await;
                } else {
                    warn!(session_id = %self.id, %error, "operation failed, rolling back");
                    self.rollback().await?;
                }
            }
        }
        result
    }

    /// Establishes a savepoint on the open transaction
    pub(crate) async fn begin_savepoint(&mut self) -> Result<(), DatabaseError> {
        let depth = self.savepoints + 1;
        let connection = self.connection("create a savepoint in")?;
        let result = execute(connection, &format!("SAVEPOINT {}", savepoint_name(depth))).await;
        if result.is_ok() {
            self.savepoints = depth;
            debug!(session_id = %self.id, depth, "savepoint established");
        }
        self.settle(result).await
    }

    /// Keeps the work done since the innermost savepoint
    ///
    /// A no-op once the transaction has ended inside the savepoint.
    pub(crate) async fn release_savepoint(&mut self) -> Result<(), DatabaseError> {
        let Some(name) = self.current_savepoint() else {
            return Ok(());
        };
        let connection = self.connection("release a savepoint of")?;
        let result = execute(connection, &format!("RELEASE SAVEPOINT {}", name)).await;
        self.savepoints -= 1;
        debug!(session_id = %self.id, depth = self.savepoints + 1, "savepoint released");
        self.settle(result).await
    }

    /// Discards the work done since the innermost savepoint and removes it
    ///
    /// A no-op once the transaction has ended inside the savepoint.
    pub(crate) async fn discard_savepoint(&mut self) -> Result<(), DatabaseError> {
        let Some(name) = self.current_savepoint() else {
            return Ok(());
        };
        let connection = self.connection("roll back a savepoint of")?;
        let mut result = execute(&mut *connection, &format!("ROLLBACK TO SAVEPOINT {}", name)).await;
        if result.is_ok() {
            result = execute(connection, &format!("RELEASE SAVEPOINT {}", name)).await;
        }
        self.savepoints -= 1;
        debug!(session_id = %self.id, depth = self.savepoints + 1, "savepoint rolled back");
        self.settle(result).await
    }

    fn current_savepoint(&self) -> Option<String> {
        (self.state == UnitOfWorkState::Open && self.savepoints > 0)
            .then(|| savepoint_name(self.savepoints))
    }

    /// Returns to the innermost savepoint, which stays established
    ///
    /// If the server refuses, the whole transaction is rolled back.
    async fn restore_savepoint(&mut self) {
        let Some(name) = self.current_savepoint() else {
            return;
        };
        let result = match self.connection("roll back a savepoint of") {
            Ok(connection) => {
                execute(connection, &format!("ROLLBACK TO SAVEPOINT {}", name)).await
            }
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            warn!(session_id = %self.id, %error, "rollback to savepoint failed, rolling back");
            // Rollback from Open cannot fail.
            let _ = self.rollback().await;
        }
    }

    /// Releases the transaction, rolling back if still open
    pub(crate) async fn close(&mut self) {
        if self.state == UnitOfWorkState::Open {
            debug!(session_id = %self.id, "closing an open unit of work");
            // Rollback from Open cannot fail.
            let _ = self.rollback().await;
        }
        self.transaction = None;
        self.savepoints = 0;
        if self.state != UnitOfWorkState::Closed {
            self.state = UnitOfWorkState::Closed;
            debug!(session_id = %self.id, "unit of work closed");
        }
    }
}

async fn execute(connection: &mut PgConnection, statement: &str) -> Result<(), DatabaseError> {
    connection.execute(statement).await.map(|_| ()).map_err(translate)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Open {
            warn!(session_id = %self.id, "unit of work dropped while open, rolling back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_is_lowercase() {
        assert_eq!(UnitOfWorkState::Created.to_string(), "created");
        assert_eq!(UnitOfWorkState::RolledBack.to_string(), "rolled back");
        assert_eq!(UnitOfWorkState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UnitOfWorkState::Created.is_terminal());
        assert!(!UnitOfWorkState::Open.is_terminal());
        assert!(UnitOfWorkState::Committed.is_terminal());
        assert!(UnitOfWorkState::RolledBack.is_terminal());
        assert!(UnitOfWorkState::Closed.is_terminal());
    }

    #[test]
    fn test_connection_requires_open_session() {
        let mut session = Session::new();
        let err = session.connection("query").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot query a unit of work in state created"
        );
    }

    #[tokio::test]
    async fn test_commit_before_open_is_invalid() {
        let mut session = Session::new();
        let err = session.commit().await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidState {
                operation: "commit",
                state: UnitOfWorkState::Created
            }
        ));
        assert_eq!(session.state(), UnitOfWorkState::Created);
    }

    #[tokio::test]
    async fn test_rollback_before_open_is_invalid() {
        let mut session = Session::new();
        assert!(session.rollback().await.is_err());
    }

    #[test]
    fn test_savepoint_names_follow_depth() {
        assert_eq!(savepoint_name(1), "uow_savepoint_1");
        assert_eq!(savepoint_name(3), "uow_savepoint_3");
    }

    #[tokio::test]
    async fn test_savepoint_requires_open_session() {
        let mut session = Session::new();
        let err = session.begin_savepoint().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot create a savepoint in a unit of work in state created"
        );
        assert_eq!(session.savepoint_depth(), 0);
        assert!(session.release_savepoint().await.is_ok());
        assert!(session.discard_savepoint().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_without_open() {
        let mut session = Session::new();
        session.close().await;
        assert_eq!(session.state(), UnitOfWorkState::Closed);
        assert!(session.commit().await.is_err());
        assert!(session.rollback().await.is_err());
        session.close().await;
        assert_eq!(session.state(), UnitOfWorkState::Closed);
    }
}
