//! Case intake orchestration
//!
//! Submission path: validate, normalize, allocate a case identifier, persist.
//! Admission control runs earlier, in the HTTP middleware.

use crate::case_id::CaseIdGenerator;
use crate::errors::{IntakeError, IntakeResult};
use crate::statistics::collect_statistics;
use chrono::{Local, Utc};
use common::{Case, CasePage, CaseStore, ListQuery, NewCase, Statistics, StoreError};
use input_validation::{
    normalize_submission, validate_list_query, validate_status_update, validate_submission,
    ListQueryParams, StatusUpdateRequest, SubmissionRequest,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Identifier allocations attempted before a collision is reported
pub const MAX_CASE_ID_ATTEMPTS: usize = 3;

/// Request metadata captured alongside a submission
#[derive(Debug, Clone, Default)]
pub struct SubmissionContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct CaseService {
    store: Arc<dyn CaseStore>,
    case_ids: Arc<dyn CaseIdGenerator>,
}

impl CaseService {
    pub fn new(store: Arc<dyn CaseStore>, case_ids: Arc<dyn CaseIdGenerator>) -> Self {
        Self { store, case_ids }
    }

    pub fn store(&self) -> &Arc<dyn CaseStore> {
        &self.store
    }

    pub async fn submit(
        &self,
        request: SubmissionRequest,
        context: SubmissionContext,
    ) -> IntakeResult<Case> {
        let valid = validate_submission(request, Local::now().date_naive())?;
        let submission = normalize_submission(valid);
        let submitted_at = Utc::now();

        let mut attempt = 1;
        loop {
            let new_case = NewCase {
                submission: submission.clone(),
                case_id: self.case_ids.generate(),
                submitted_at,
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
            };

            match self.store.create(new_case).await {
                Ok(case) => {
                    info!(case_id = %case.case_id, id = case.id, "Form submission accepted");
                    return Ok(case);
                }
                Err(err) if err.is_duplicate_identifier() && attempt < MAX_CASE_ID_ATTEMPTS => {
                    warn!(error = %err, attempt, "Case identifier collision, regenerating");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn list(&self, params: ListQueryParams) -> IntakeResult<(ListQuery, CasePage)> {
        let query = validate_list_query(params).map_err(IntakeError::InvalidQuery)?;
        let page = self.store.list(&query).await?;
        Ok((query, page))
    }

    pub async fn get(&self, id: i64) -> IntakeResult<Case> {
        Ok(self.store.get(id).await?)
    }

    pub async fn get_by_case_id(&self, case_id: &str) -> IntakeResult<Case> {
        self.store.get_by_case_id(case_id).await.map_err(|err| match err {
            StoreError::NotFound => IntakeError::NotFound("Case not found"),
            other => other.into(),
        })
    }

    pub async fn update_status(&self, id: i64, request: StatusUpdateRequest) -> IntakeResult<Case> {
        let update = validate_status_update(request)?;
        let previous = self.store.get(id).await?.status;
        let case = self.store.update_status(id, update).await?;

        if previous != case.status {
            info!(
                case_id = %case.case_id,
                from = %previous,
                to = %case.status,
                "Case status changed"
            );
        }
        Ok(case)
    }

    pub async fn soft_delete(&self, id: i64) -> IntakeResult<Case> {
        let case = self.store.soft_delete(id).await?;
        info!(case_id = %case.case_id, "Case closed by soft delete");
        Ok(case)
    }

    pub async fn statistics(&self) -> IntakeResult<Statistics> {
        Ok(collect_statistics(self.store.as_ref(), Local::now()).await?)
    }
}
