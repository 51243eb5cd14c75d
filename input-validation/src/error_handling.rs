//! Field-level validation errors
//!
//! Errors are always reported as a list so a form can highlight every
//! invalid field at once.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single violation: which field, and a message safe to show the submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered collection of violations; never empty when returned as an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed with {} error(s)", .0.len())]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Distinct field names, in first-reported order
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for error in &self.0 {
            if !fields.contains(&error.field.as_str()) {
                fields.push(&error.field);
            }
        }
        fields
    }

    /// Stable-sort by the position of each field in `order`; unknown fields go last
    pub(crate) fn sort_by_field_order(&mut self, order: &[&str]) {
        self.0.sort_by_key(|error| {
            order
                .iter()
                .position(|field| *field == error.field)
                .unwrap_or(order.len())
        });
    }

    /// Replace everything reported for the fields named in `other` with
    /// `other`'s errors
    pub(crate) fn supersede_with(&mut self, other: FieldErrors) {
        let replaced: Vec<String> = other.fields().into_iter().map(str::to_string).collect();
        self.0.retain(|error| !replaced.contains(&error.field));
        self.0.extend(other.0);
    }

    /// `Ok(value)` when nothing was collected, otherwise the errors
    pub fn into_result<T>(self, value: T) -> ValidationResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, FieldErrors>;
