//! Shareable case identifiers: `CASE-<epoch-millis>-<0..999>`

use chrono::Utc;
use common::constants::CASE_ID_PREFIX;
use rand::Rng;

/// Source of candidate case identifiers.
///
/// Uniqueness is not guaranteed here; the store rejects collisions and the
/// caller asks for another candidate.
pub trait CaseIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Millisecond timestamp plus a uniform random suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCaseIdGenerator;

impl CaseIdGenerator for TimestampCaseIdGenerator {
    fn generate(&self) -> String {
        let suffix = rand::thread_rng().gen_range(0..1000);
        format_case_id(Utc::now().timestamp_millis(), suffix)
    }
}

pub fn format_case_id(epoch_millis: i64, suffix: u16) -> String {
    format!("{CASE_ID_PREFIX}-{epoch_millis}-{suffix}")
}
