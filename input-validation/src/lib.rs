//! # Input Validation and Normalization
//!
//! Contract checking for everything an untrusted intake form or list query
//! can send, and the pure transforms that turn accepted values into their
//! stored form:
//!
//! - Submission schema: collects every field violation, never fail-fast
//! - Query schema: applies defaults before the request proceeds
//! - Status-update schema: rejects values outside the closed enumerations
//! - Normalization: trimming, casing, phone formatting, blank-to-absent

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod error_handling;
pub mod sanitization;
pub mod validation;

pub use error_handling::{FieldError, FieldErrors, ValidationResult};
pub use sanitization::{format_phone_number, normalize_email, normalize_name, normalize_submission};
pub use validation::{
    validate_list_query, validate_status_update, validate_submission, ListQueryParams,
    StatusUpdateRequest, SubmissionRequest, ValidSubmission,
};
