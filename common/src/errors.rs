//! Storage error taxonomy shared by every `CaseStore` backend

use thiserror::Error;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a `CaseStore`.
///
/// Backends translate their driver errors into these variants at the
/// boundary; callers never see raw driver text in the variant payloads they
/// return to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The generated case identifier collided with an existing record.
    /// Retryable by generating a new identifier.
    #[error("duplicate case identifier: {case_id}")]
    DuplicateIdentifier { case_id: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage unavailable: {0}")]
    Connectivity(String),
}

impl StoreError {
    /// Whether the caller may retry with a freshly generated identifier
    pub fn is_duplicate_identifier(&self) -> bool {
        matches!(self, StoreError::DuplicateIdentifier { .. })
    }
}
