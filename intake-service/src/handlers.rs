use crate::admission::ClientAddress;
use crate::errors::{IntakeError, IntakeResult};
use crate::response::{ApiEnvelope, ApiResponse};
use crate::service::SubmissionContext;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, Uri},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use common::{
    CaseDetail, CaseSummary, Pagination, PublicCase, SortField, SortOrder, Statistics,
    SubmissionReceipt,
};
use input_validation::{ListQueryParams, StatusUpdateRequest, SubmissionRequest};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Non-numeric ids can never match a record
fn parse_id(raw: &str) -> IntakeResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| IntakeError::NotFound("Form entry not found"))
}

/// Only unparseable JSON is malformed; a well-formed body with mistyped
/// fields is decoded later and reported field by field
fn json_body(body: Result<Json<Value>, JsonRejection>) -> IntakeResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| IntakeError::malformed(rejection.body_text()))
}

pub async fn create_case(
    State(state): State<Arc<AppState>>,
    client: Option<Extension<ClientAddress>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> IntakeResult<ApiResponse<SubmissionReceipt>> {
    let request = SubmissionRequest::from_json(json_body(body)?)?;
    let context = SubmissionContext {
        ip_address: client.map(|Extension(ClientAddress(ip))| ip.to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|ua| ua.to_str().ok())
            .map(str::to_string),
    };

    let case = state.service.submit(request, context).await?;
    Ok(ApiResponse::created(
        format!("Form submitted successfully! Your case ID is: {}", case.case_id),
        case.receipt(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilters {
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Serialize)]
pub struct CaseList {
    pub entries: Vec<CaseSummary>,
    pub pagination: Pagination,
    pub filters: ListFilters,
}

pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListQueryParams>, QueryRejection>,
) -> IntakeResult<ApiResponse<CaseList>> {
    let Query(params) =
        params.map_err(|rejection| IntakeError::unreadable_query(rejection.body_text()))?;
    let (query, page) = state.service.list(params).await?;

    let pagination = Pagination::new(&query, page.total);
    let message = format!("Retrieved {} of {} form entries", page.entries.len(), page.total);
    let list = CaseList {
        entries: page.entries.iter().map(|case| case.summary()).collect(),
        pagination,
        filters: ListFilters {
            search: query.search,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        },
    };
    Ok(ApiResponse::ok(message, list))
}

pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> IntakeResult<ApiResponse<CaseDetail>> {
    let case = state.service.get(parse_id(&id)?).await?;
    Ok(ApiResponse::ok("Form entry retrieved successfully", case.detail()))
}

pub async fn get_case_by_case_id(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
) -> IntakeResult<ApiResponse<PublicCase>> {
    let case = state.service.get_by_case_id(&case_id).await?;
    Ok(ApiResponse::ok("Case retrieved successfully", case.public_view()))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> IntakeResult<ApiResponse<PublicCase>> {
    let id = parse_id(&id)?;
    let request = StatusUpdateRequest::from_json(json_body(body)?)?;
    let case = state.service.update_status(id, request).await?;
    Ok(ApiResponse::ok("Form entry status updated successfully", case.public_view()))
}

pub async fn soft_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> IntakeResult<Json<ApiEnvelope<()>>> {
    state.service.soft_delete(parse_id(&id)?).await?;
    Ok(Json(ApiEnvelope::message_only("Form entry deleted successfully")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsView {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub last_updated: DateTime<Utc>,
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> IntakeResult<ApiResponse<StatisticsView>> {
    let statistics = state.service.statistics().await?;
    Ok(ApiResponse::ok(
        "Statistics retrieved successfully",
        StatisticsView {
            statistics,
            last_updated: Utc::now(),
        },
    ))
}

pub async fn api_index() -> ApiResponse<Value> {
    ApiResponse::ok(
        "Legal case intake API",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "submitForm": "POST /api/form",
                "listEntries": "GET /api/form",
                "statistics": "GET /api/form/stats",
                "getByCaseId": "GET /api/form/case/:caseId",
                "getEntry": "GET /api/form/:id",
                "updateStatus": "PATCH /api/form/:id/status",
                "deleteEntry": "DELETE /api/form/:id"
            }
        }),
    )
}

pub async fn route_not_found(uri: Uri) -> IntakeError {
    IntakeError::RouteNotFound {
        path: uri.path().to_string(),
    }
}
