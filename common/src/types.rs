//! Case record, lifecycle enumerations and the views exposed over the API

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a string does not name a variant of a closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle state of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    New,
    Contacted,
    InProgress,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 4] =
        [CaseStatus::New, CaseStatus::Contacted, CaseStatus::InProgress, CaseStatus::Closed];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::New => "new",
            CaseStatus::Contacted => "contacted",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::Closed => "closed",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("status", s))
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triage hint. Only ever changed by an explicit update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("priority", s))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnosis reported by the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisType {
    Mesothelioma,
    LungCancer,
    Asbestosis,
    PleuralDisease,
    Other,
}

impl DiagnosisType {
    pub const ALL: [DiagnosisType; 5] = [
        DiagnosisType::Mesothelioma,
        DiagnosisType::LungCancer,
        DiagnosisType::Asbestosis,
        DiagnosisType::PleuralDisease,
        DiagnosisType::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DiagnosisType::Mesothelioma => "mesothelioma",
            DiagnosisType::LungCancer => "lung_cancer",
            DiagnosisType::Asbestosis => "asbestosis",
            DiagnosisType::PleuralDisease => "pleural_disease",
            DiagnosisType::Other => "other",
        }
    }
}

impl FromStr for DiagnosisType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosisType::ALL
            .into_iter()
            .find(|diagnosis| diagnosis.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("diagnosis type", s))
    }
}

impl fmt::Display for DiagnosisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, normalized submission ready for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSubmission {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub date_of_diagnosis: Option<NaiveDate>,
    pub type_of_diagnosis: Option<DiagnosisType>,
    pub message: Option<String>,
}

/// Everything a store needs to create a case record
#[derive(Debug, Clone)]
pub struct NewCase {
    pub submission: CaseSubmission,
    pub case_id: String,
    pub submitted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The persisted case record.
///
/// Deliberately not `Serialize`: callers must pick one of the projections
/// below, none of which carry `ip_address`, `user_agent` or `notes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: i64,
    pub case_id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub date_of_diagnosis: Option<NaiveDate>,
    pub type_of_diagnosis: Option<DiagnosisType>,
    pub message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: CaseStatus,
    pub priority: Priority,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Build a fresh record in its initial lifecycle state
    pub fn from_new(id: i64, new_case: NewCase, now: DateTime<Utc>) -> Self {
        let NewCase {
            submission,
            case_id,
            submitted_at,
            ip_address,
            user_agent,
        } = new_case;
        Self {
            id,
            case_id,
            full_name: submission.full_name,
            email: submission.email,
            phone_number: submission.phone_number,
            date_of_birth: submission.date_of_birth,
            job_title: submission.job_title,
            date_of_diagnosis: submission.date_of_diagnosis,
            type_of_diagnosis: submission.type_of_diagnosis,
            message: submission.message,
            ip_address,
            user_agent,
            status: CaseStatus::default(),
            priority: Priority::default(),
            notes: None,
            submitted_at,
            contacted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update.
    ///
    /// Transitions are intentionally permissive: any status may move to any
    /// other status, including out of `closed`. `contacted_at` is written
    /// only here, and only on the first move to `contacted`.
    pub fn apply_update(&mut self, update: CaseUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            if status == CaseStatus::Contacted && self.contacted_at.is_none() {
                self.contacted_at = Some(now);
            }
            self.status = status;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        self.notes = update.notes.apply(self.notes.take());
        self.updated_at = now;
    }

    /// Soft delete: force `closed`, keep the row
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = CaseStatus::Closed;
        self.updated_at = now;
    }

    pub fn receipt(&self) -> SubmissionReceipt {
        SubmissionReceipt {
            case_id: self.case_id.clone(),
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            status: self.status,
            submitted_at: self.submitted_at,
        }
    }

    pub fn public_view(&self) -> PublicCase {
        PublicCase {
            id: self.id,
            case_id: self.case_id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            status: self.status,
            priority: self.priority,
            submitted_at: self.submitted_at,
            created_at: self.created_at,
        }
    }

    pub fn detail(&self) -> CaseDetail {
        CaseDetail {
            id: self.id,
            case_id: self.case_id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            date_of_birth: self.date_of_birth,
            job_title: self.job_title.clone(),
            date_of_diagnosis: self.date_of_diagnosis,
            type_of_diagnosis: self.type_of_diagnosis,
            message: self.message.clone(),
            status: self.status,
            priority: self.priority,
            submitted_at: self.submitted_at,
            contacted_at: self.contacted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            id: self.id,
            case_id: self.case_id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            job_title: self.job_title.clone(),
            type_of_diagnosis: self.type_of_diagnosis,
            status: self.status,
            priority: self.priority,
            submitted_at: self.submitted_at,
            created_at: self.created_at,
        }
    }
}

/// Returned to the submitter after a successful create
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub case_id: String,
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub status: CaseStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Minimal public projection of a case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicCase {
    pub id: i64,
    pub case_id: String,
    pub full_name: String,
    pub email: String,
    pub status: CaseStatus,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Full projection minus the internal fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetail {
    pub id: i64,
    pub case_id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub date_of_diagnosis: Option<NaiveDate>,
    pub type_of_diagnosis: Option<DiagnosisType>,
    pub message: Option<String>,
    pub status: CaseStatus,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape used by list results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub id: i64,
    pub case_id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub job_title: Option<String>,
    pub type_of_diagnosis: Option<DiagnosisType>,
    pub status: CaseStatus,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Optional-overwrite for a nullable field.
///
/// `Keep` leaves the stored value alone, `Clear` nulls it, `Set` replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => None,
            FieldUpdate::Set(value) => Some(value),
        }
    }
}

/// Partial update applied by the lifecycle operation.
/// `None` on `status`/`priority` means "leave unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaseUpdate {
    pub status: Option<CaseStatus>,
    pub priority: Option<Priority>,
    pub notes: FieldUpdate<String>,
}

impl CaseUpdate {
    pub fn status(status: CaseStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Columns a list may be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "fullName")]
    FullName,
    #[serde(rename = "email")]
    Email,
}

impl SortField {
    pub const ALL: [SortField; 3] = [SortField::CreatedAt, SortField::FullName, SortField::Email];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::FullName => "fullName",
            SortField::Email => "email",
        }
    }
}

impl FromStr for SortField {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("sort field", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(UnknownVariant::new("sort order", s)),
        }
    }
}

/// A validated list request with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// One page of list results plus the total matching count
#[derive(Debug, Clone, Default)]
pub struct CasePage {
    pub entries: Vec<Case>,
    pub total: u64,
}

/// Pagination metadata for a list response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_entries: u64,
    pub entries_per_page: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: u64) -> Self {
        let limit = u64::from(query.limit.max(1));
        let has_next = query.offset() + limit < total;
        let has_prev = query.page > 1;
        Self {
            current_page: query.page,
            total_pages: total.div_ceil(limit),
            total_entries: total,
            entries_per_page: query.limit,
            has_next,
            has_prev,
            next_page: has_next.then(|| query.page + 1),
            prev_page: has_prev.then(|| query.page - 1),
        }
    }
}

/// Aggregate counts over the whole store, recomputed per call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: u64,
    pub today: u64,
    /// Only statuses present in the store appear here
    pub status_counts: BTreeMap<CaseStatus, u64>,
}
