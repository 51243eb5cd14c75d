#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]
//! Common types for the case intake workspace
//!
//! This crate holds the case record, its lifecycle enumerations and views,
//! the list/query vocabulary, and the `CaseStore` persistence contract that
//! both the validation layer and the intake service build on.

pub mod constants;
pub mod errors;
pub mod store;
pub mod types;

pub use errors::*;
pub use store::*;
pub use types::*;
