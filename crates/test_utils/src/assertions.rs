//! Custom Test Assertions
//!
//! Assertions over the database error taxonomy that report the full error
//! on failure.

use infra_db::{DatabaseError, ErrorKind, UnitOfWorkState};

/// Asserts that `error` is a constraint violation on `constraint`
pub fn assert_conflict_on(error: &DatabaseError, constraint: &str) {
    assert_eq!(
        error.kind(),
        ErrorKind::Conflict,
        "Expected a conflict on {}, got {:?}",
        constraint,
        error
    );
    assert_eq!(
        error.constraint(),
        Some(constraint),
        "Conflict reported the wrong constraint: {:?}",
        error
    );
}

/// Asserts that `error` reports an operation attempted in `state`
pub fn assert_invalid_state(error: &DatabaseError, state: UnitOfWorkState) {
    match error {
        DatabaseError::InvalidState { state: actual, .. } => assert_eq!(
            *actual, state,
            "Invalid state error reported the wrong state: {:?}",
            error
        ),
        other => panic!("Expected an invalid state error in {}, got {:?}", state, other),
    }
}

pub fn assert_not_found(error: &DatabaseError) {
    assert!(error.is_not_found(), "Expected not found, got {:?}", error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_conflict_on_passes() {
        let error = DatabaseError::Conflict {
            constraint: Some("items_title_key".to_string()),
            message: "duplicate key".to_string(),
        };
        assert_conflict_on(&error, "items_title_key");
    }

    #[test]
    #[should_panic(expected = "wrong constraint")]
    fn test_assert_conflict_on_wrong_constraint() {
        let error = DatabaseError::Conflict {
            constraint: Some("users_username_key".to_string()),
            message: "duplicate key".to_string(),
        };
        assert_conflict_on(&error, "items_title_key");
    }

    #[test]
    fn test_assert_invalid_state() {
        let error = DatabaseError::invalid_state("commit", UnitOfWorkState::Committed);
        assert_invalid_state(&error, UnitOfWorkState::Committed);
    }
}
