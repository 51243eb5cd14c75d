//! In-process `CaseStore` backend
//!
//! Used when no database is configured and by the test suites. Applies the
//! same column-width contract as the PostgreSQL schema so both backends
//! reject the same records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::constants::{
    CASE_ID_MAX_LENGTH, EMAIL_MAX_LENGTH, IP_ADDRESS_MAX_LENGTH, JOB_TITLE_MAX_LENGTH,
    MESSAGE_MAX_LENGTH, NAME_MAX_LENGTH, PHONE_MAX_LENGTH,
};
use common::{
    Case, CasePage, CaseStatus, CaseStore, CaseUpdate, ListQuery, NewCase, SortField, SortOrder,
    StoreError, StoreResult,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    cases: BTreeMap<i64, Case>,
    by_case_id: HashMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    inner: RwLock<Inner>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_width(column: &str, value: Option<&str>, max: usize) -> StoreResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(StoreError::ConstraintViolation(format!(
            "{column} exceeds {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn check_columns(new_case: &NewCase) -> StoreResult<()> {
    let s = &new_case.submission;
    check_width("case_id", Some(&new_case.case_id), CASE_ID_MAX_LENGTH)?;
    check_width("full_name", Some(&s.full_name), NAME_MAX_LENGTH as usize)?;
    check_width("email", Some(&s.email), EMAIL_MAX_LENGTH as usize)?;
    check_width("phone_number", s.phone_number.as_deref(), PHONE_MAX_LENGTH as usize)?;
    check_width("job_title", s.job_title.as_deref(), JOB_TITLE_MAX_LENGTH as usize)?;
    check_width("message", s.message.as_deref(), MESSAGE_MAX_LENGTH as usize)?;
    check_width("ip_address", new_case.ip_address.as_deref(), IP_ADDRESS_MAX_LENGTH)?;
    if s.full_name.is_empty() || s.email.is_empty() {
        return Err(StoreError::ConstraintViolation("full_name and email are required".into()));
    }
    Ok(())
}

fn matches_search(case: &Case, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
    contains(&case.full_name)
        || contains(&case.email)
        || contains(&case.case_id)
        || case.job_title.as_deref().is_some_and(contains)
}

fn compare(a: &Case, b: &Case, field: SortField) -> Ordering {
    let primary = match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::FullName => a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()),
        SortField::Email => a.email.to_lowercase().cmp(&b.email.to_lowercase()),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn create(&self, new_case: NewCase) -> StoreResult<Case> {
        check_columns(&new_case)?;

        let mut inner = self.inner.write().await;
        if inner.by_case_id.contains_key(&new_case.case_id) {
            return Err(StoreError::DuplicateIdentifier {
                case_id: new_case.case_id,
            });
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let case = Case::from_new(id, new_case, Utc::now());
        inner.by_case_id.insert(case.case_id.clone(), id);
        inner.cases.insert(id, case.clone());
        Ok(case)
    }

    async fn update_status(&self, id: i64, update: CaseUpdate) -> StoreResult<Case> {
        let mut inner = self.inner.write().await;
        let case = inner.cases.get_mut(&id).ok_or(StoreError::NotFound)?;
        case.apply_update(update, Utc::now());
        Ok(case.clone())
    }

    async fn soft_delete(&self, id: i64) -> StoreResult<Case> {
        let mut inner = self.inner.write().await;
        let case = inner.cases.get_mut(&id).ok_or(StoreError::NotFound)?;
        case.close(Utc::now());
        Ok(case.clone())
    }

    async fn get(&self, id: i64) -> StoreResult<Case> {
        let inner = self.inner.read().await;
        inner.cases.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_by_case_id(&self, case_id: &str) -> StoreResult<Case> {
        let inner = self.inner.read().await;
        inner
            .by_case_id
            .get(case_id)
            .and_then(|id| inner.cases.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<CasePage> {
        let inner = self.inner.read().await;
        let needle = query.search.as_deref().map(str::to_lowercase);

        let mut matching: Vec<&Case> = inner
            .cases
            .values()
            .filter(|case| needle.as_deref().map_or(true, |n| matches_search(case, n)))
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let entries = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(CasePage { entries, total })
    }

    async fn count_all(&self) -> StoreResult<u64> {
        Ok(self.inner.read().await.cases.len() as u64)
    }

    async fn count_submitted_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.cases.values().filter(|case| case.submitted_at >= since).count() as u64)
    }

    async fn count_by_status(&self) -> StoreResult<BTreeMap<CaseStatus, u64>> {
        let inner = self.inner.read().await;
        let mut counts = BTreeMap::new();
        for case in inner.cases.values() {
            *counts.entry(case.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
