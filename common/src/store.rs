//! Defines the `CaseStore` trait for case persistence.

use crate::errors::StoreResult;
use crate::types::{Case, CasePage, CaseStatus, CaseUpdate, ListQuery, NewCase};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A pluggable storage backend for case records.
///
/// The store is the sole owner of persisted cases; nothing else mutates a
/// record. Cases are never hard-deleted through this interface.
#[async_trait]
pub trait CaseStore: Send + Sync {
    // === Write path ===

    /// Persist a new case. Assigns `id` and the record timestamps.
    /// Fails with `DuplicateIdentifier` if `case_id` is already taken.
    async fn create(&self, new_case: NewCase) -> StoreResult<Case>;

    /// Partial update of status, priority and notes.
    async fn update_status(&self, id: i64, update: CaseUpdate) -> StoreResult<Case>;

    /// Force `status = closed` without removing the row.
    async fn soft_delete(&self, id: i64) -> StoreResult<Case>;

    // === Read path ===

    async fn get(&self, id: i64) -> StoreResult<Case>;

    /// Case-sensitive exact match on the shareable identifier.
    async fn get_by_case_id(&self, case_id: &str) -> StoreResult<Case>;

    /// Filtered, sorted page plus the total count of matching records.
    async fn list(&self, query: &ListQuery) -> StoreResult<CasePage>;

    // === Aggregation ===

    async fn count_all(&self) -> StoreResult<u64>;
    async fn count_submitted_since(&self, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Counts grouped by status; statuses with no records are absent.
    async fn count_by_status(&self) -> StoreResult<BTreeMap<CaseStatus, u64>>;

    // === Health ===
    async fn health_check(&self) -> StoreResult<bool>;
}
