//! Field validation helpers
//!
//! Creation and update shapes derive `validator::Validate`. This module turns
//! the collected field errors into a single [`CatalogError::Validation`] with a
//! stable, sorted message so callers can surface it directly.

use validator::{Validate, ValidationErrors};

use crate::error::CatalogError;

/// Validates `value` and flattens any field errors into a `CatalogError`
pub fn validate<T: Validate>(value: &T) -> Result<(), CatalogError> {
    value
        .validate()
        .map_err(|errors| CatalogError::Validation(describe(&errors)))
}

/// Renders field errors as `field: code` pairs, sorted by field name
fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| format!("{}: {}", field, e.code))
        })
        .collect();
    parts.sort();
    parts.join(", ")
}
