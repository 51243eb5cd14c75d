//! Request schemas for the intake API
//!
//! Three independent contracts:
//! - [`validate_submission`] for the public create form,
//! - [`validate_list_query`] for list/search parameters,
//! - [`validate_status_update`] for lifecycle updates.
//!
//! Structural rules (presence, length, email shape) are declared with the
//! `validator` derive; format, date and enumeration rules are checked by
//! hand. Every violation is collected before returning.

use crate::error_handling::{FieldErrors, ValidationResult};
use chrono::{DateTime, NaiveDate};
use common::constants::{
    DATE_OF_BIRTH_MIN, DATE_OF_DIAGNOSIS_MIN, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    SEARCH_MAX_LENGTH,
};
use common::{
    CaseStatus, CaseUpdate, DiagnosisType, FieldUpdate, ListQuery, Priority, SortField, SortOrder,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use validator::Validate;

/// Letters, whitespace, hyphen, apostrophe and period
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s\-'.]+$").expect("name pattern is valid"));

/// Optional leading `+`, then up to 16 digits not starting with 0
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9][0-9]{0,15}$").expect("phone pattern is valid"));

/// Wire names of the submission fields, in the order errors are reported
const SUBMISSION_FIELDS: [&str; 8] = [
    "fullName",
    "email",
    "phoneNumber",
    "dateOfBirth",
    "jobTitle",
    "dateOfDiagnosis",
    "typeOfDiagnosis",
    "message",
];

const STATUS_UPDATE_FIELDS: [&str; 3] = ["status", "priority", "notes"];

/// Decode a JSON object into a request shape without letting one mistyped
/// field reject the whole body.
///
/// Each listed field holding anything other than a string or `null` is
/// reported as `<field> must be a string` and dropped before decoding.
/// Unknown keys are ignored.
fn decode_string_fields<T: DeserializeOwned>(
    body: Value,
    fields: &[&str],
) -> ValidationResult<(T, FieldErrors)> {
    let Value::Object(mut object) = body else {
        return Err(FieldErrors::single("body", "Request body must be a JSON object"));
    };

    let mut type_errors = FieldErrors::new();
    for field in fields {
        let mistyped = object
            .get(*field)
            .is_some_and(|value| !(value.is_string() || value.is_null()));
        if mistyped {
            object.remove(*field);
            type_errors.push(*field, format!("{field} must be a string"));
        }
    }

    let request = serde_json::from_value(Value::Object(object))
        .map_err(|err| FieldErrors::single("body", err.to_string()))?;
    Ok((request, type_errors))
}

/// Raw create-case body. Unknown keys are dropped by deserialization.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[validate(required, length(min = 2, max = 100))]
    pub full_name: Option<String>,

    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,

    #[validate(length(max = 20))]
    pub phone_number: Option<String>,

    pub date_of_birth: Option<String>,

    #[validate(length(max = 100))]
    pub job_title: Option<String>,

    pub date_of_diagnosis: Option<String>,

    pub type_of_diagnosis: Option<String>,

    #[validate(length(max = 2000))]
    pub message: Option<String>,

    /// Fields that arrived with a non-string JSON type
    #[serde(skip)]
    pub type_errors: FieldErrors,
}

impl SubmissionRequest {
    /// Decode a create-case body, recording mistyped fields instead of
    /// failing the whole request
    pub fn from_json(body: Value) -> ValidationResult<Self> {
        let (mut request, type_errors): (Self, _) =
            decode_string_fields(body, &SUBMISSION_FIELDS)?;
        request.type_errors = type_errors;
        Ok(request)
    }

    /// Optional fields arrive as `""` from HTML forms; treat blank as absent
    fn blank_to_none(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }
        Self {
            full_name: clean(self.full_name),
            email: clean(self.email),
            phone_number: clean(self.phone_number),
            date_of_birth: clean(self.date_of_birth),
            job_title: clean(self.job_title),
            date_of_diagnosis: clean(self.date_of_diagnosis),
            type_of_diagnosis: clean(self.type_of_diagnosis),
            message: clean(self.message),
            type_errors: self.type_errors,
        }
    }
}

/// A submission that passed every rule but is not yet normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub date_of_diagnosis: Option<NaiveDate>,
    pub type_of_diagnosis: Option<DiagnosisType>,
    pub message: Option<String>,
}

/// Validate a create-case body against the submission schema.
///
/// `today` is the server-local calendar date used for the "not in the
/// future" rules.
pub fn validate_submission(
    request: SubmissionRequest,
    today: NaiveDate,
) -> ValidationResult<ValidSubmission> {
    let mut request = request.blank_to_none();
    let type_errors = std::mem::take(&mut request.type_errors);
    let mut errors = FieldErrors::new();

    if let Err(structural) = request.validate() {
        for (key, field_errors) in structural.field_errors() {
            let field = wire_name(&key.to_string());
            for error in field_errors.iter() {
                errors.push(field, structural_message(field, &error.code, &request));
            }
        }
    }

    if let Some(name) = &request.full_name {
        if !NAME_PATTERN.is_match(name) {
            errors.push(
                "fullName",
                "Name can only contain letters, spaces, hyphens, apostrophes, and periods",
            );
        }
    }

    if let Some(phone) = &request.phone_number {
        if !PHONE_PATTERN.is_match(phone) {
            errors.push("phoneNumber", "Please provide a valid phone number");
        }
    }

    let date_of_birth = check_date(
        &mut errors,
        "dateOfBirth",
        request.date_of_birth.as_deref(),
        date_floor(DATE_OF_BIRTH_MIN),
        today,
        DateMessages {
            invalid: "Date of birth must be a valid date",
            too_early: "Please provide a valid date of birth",
            future: "Date of birth cannot be in the future",
        },
    );

    let date_of_diagnosis = check_date(
        &mut errors,
        "dateOfDiagnosis",
        request.date_of_diagnosis.as_deref(),
        date_floor(DATE_OF_DIAGNOSIS_MIN),
        today,
        DateMessages {
            invalid: "Diagnosis date must be a valid date",
            too_early: "Please provide a valid diagnosis date",
            future: "Diagnosis date cannot be in the future",
        },
    );

    let type_of_diagnosis = match request.type_of_diagnosis.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<DiagnosisType>() {
            Ok(diagnosis) => Some(diagnosis),
            Err(_) => {
                errors.push(
                    "typeOfDiagnosis",
                    format!("Diagnosis type must be one of: {}", diagnosis_list()),
                );
                None
            }
        },
    };

    // A mistyped field is reported once, as a type error
    errors.supersede_with(type_errors);
    errors.sort_by_field_order(&SUBMISSION_FIELDS);
    if !errors.is_empty() {
        return Err(errors);
    }

    // Presence of both required fields is guaranteed once `errors` is empty.
    match (request.full_name, request.email) {
        (Some(full_name), Some(email)) => Ok(ValidSubmission {
            full_name,
            email,
            phone_number: request.phone_number,
            date_of_birth,
            job_title: request.job_title,
            date_of_diagnosis,
            type_of_diagnosis,
            message: request.message,
        }),
        (full_name, _) => {
            let mut errors = FieldErrors::new();
            if full_name.is_none() {
                errors.push("fullName", "Full name is required");
            } else {
                errors.push("email", "Email is required");
            }
            Err(errors)
        }
    }
}

fn wire_name(key: &str) -> &'static str {
    match key {
        "full_name" | "fullName" => "fullName",
        "email" => "email",
        "phone_number" | "phoneNumber" => "phoneNumber",
        "job_title" | "jobTitle" => "jobTitle",
        "message" => "message",
        _ => "body",
    }
}

fn structural_message(field: &str, code: &str, request: &SubmissionRequest) -> String {
    let chars = |value: &Option<String>| value.as_deref().map(|v| v.chars().count()).unwrap_or(0);
    match (field, code) {
        ("fullName", "required") => "Full name is required".to_string(),
        ("fullName", "length") if chars(&request.full_name) < 2 => {
            "Name must be at least 2 characters".to_string()
        }
        ("fullName", "length") => "Name must not exceed 100 characters".to_string(),
        ("email", "required") => "Email is required".to_string(),
        ("email", "email") => "Please provide a valid email address".to_string(),
        ("email", "length") => "Email must not exceed 255 characters".to_string(),
        ("phoneNumber", "length") => "Phone number must not exceed 20 characters".to_string(),
        ("jobTitle", "length") => "Job title must not exceed 100 characters".to_string(),
        ("message", "length") => "Message must not exceed 2000 characters".to_string(),
        (field, code) => format!("{field} failed the {code} rule"),
    }
}

struct DateMessages {
    invalid: &'static str,
    too_early: &'static str,
    future: &'static str,
}

fn date_floor((year, month, day): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (date part kept)
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn check_date(
    errors: &mut FieldErrors,
    field: &'static str,
    raw: Option<&str>,
    floor: NaiveDate,
    today: NaiveDate,
    messages: DateMessages,
) -> Option<NaiveDate> {
    let raw = raw?;
    let Some(date) = parse_date(raw) else {
        errors.push(field, messages.invalid);
        return None;
    };
    if date > today {
        errors.push(field, messages.future);
    }
    if date < floor {
        errors.push(field, messages.too_early);
    }
    Some(date)
}

fn diagnosis_list() -> String {
    DiagnosisType::ALL
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw list query string. Every field is optional; defaults are applied by
/// [`validate_list_query`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Validate list parameters and fill in defaults
pub fn validate_list_query(params: ListQueryParams) -> ValidationResult<ListQuery> {
    let mut errors = FieldErrors::new();
    let mut query = ListQuery::default();

    query.page = parse_bounded(
        &mut errors,
        "page",
        params.page.as_deref(),
        DEFAULT_PAGE,
        1,
        None,
    );
    query.limit = parse_bounded(
        &mut errors,
        "limit",
        params.limit.as_deref(),
        DEFAULT_PAGE_SIZE,
        1,
        Some(MAX_PAGE_SIZE),
    );

    if let Some(search) = params.search {
        if search.chars().count() > SEARCH_MAX_LENGTH {
            let message = format!(
                "search length must be less than or equal to {SEARCH_MAX_LENGTH} characters long"
            );
            errors.push("search", message);
        }
        let search = search.trim();
        query.search = (!search.is_empty()).then(|| search.to_string());
    }

    if let Some(sort_by) = params.sort_by.as_deref() {
        match sort_by.parse::<SortField>() {
            Ok(field) => query.sort_by = field,
            Err(_) => errors.push(
                "sortBy",
                "sortBy must be one of [createdAt, fullName, email]",
            ),
        }
    }

    if let Some(sort_order) = params.sort_order.as_deref() {
        match sort_order.parse::<SortOrder>() {
            Ok(order) => query.sort_order = order,
            Err(_) => errors.push("sortOrder", "sortOrder must be one of [ASC, DESC]"),
        }
    }

    errors.into_result(query)
}

fn parse_bounded(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    default: u32,
    min: i64,
    max: Option<u32>,
) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return default;
    };
    let value = match raw.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            let message = if raw.parse::<f64>().is_ok() {
                format!("{field} must be an integer")
            } else {
                format!("{field} must be a number")
            };
            errors.push(field, message);
            return default;
        }
    };
    if value < min {
        errors.push(
            field,
            format!("{field} must be greater than or equal to {min}"),
        );
        return default;
    }
    if let Some(max) = max {
        if value > i64::from(max) {
            errors.push(
                field,
                format!("{field} must be less than or equal to {max}"),
            );
            return default;
        }
    }
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Raw lifecycle update body.
///
/// `notes` distinguishes absent (keep) from `null` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,

    /// Fields that arrived with a non-string JSON type
    #[serde(skip)]
    pub type_errors: FieldErrors,
}

impl StatusUpdateRequest {
    pub fn from_json(body: Value) -> ValidationResult<Self> {
        let (mut request, type_errors): (Self, _) =
            decode_string_fields(body, &STATUS_UPDATE_FIELDS)?;
        request.type_errors = type_errors;
        Ok(request)
    }
}

/// Maps a present key (even `null`) to `Some`, so a missing key stays `None`
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Validate a lifecycle update into a typed partial update
pub fn validate_status_update(request: StatusUpdateRequest) -> ValidationResult<CaseUpdate> {
    let mut errors = request.type_errors;
    let mut update = CaseUpdate::default();

    let status = request
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(raw) = status {
        match raw.parse::<CaseStatus>() {
            Ok(status) => update.status = Some(status),
            Err(_) => errors.push(
                "status",
                format!(
                    "Status must be one of: {}",
                    CaseStatus::ALL
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
        }
    }

    let priority = request
        .priority
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(raw) = priority {
        match raw.parse::<Priority>() {
            Ok(priority) => update.priority = Some(priority),
            Err(_) => errors.push(
                "priority",
                format!(
                    "Priority must be one of: {}",
                    Priority::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
        }
    }

    update.notes = match request.notes {
        None => FieldUpdate::Keep,
        Some(None) => FieldUpdate::Clear,
        Some(Some(text)) => {
            let text = text.trim();
            if text.is_empty() {
                FieldUpdate::Clear
            } else {
                FieldUpdate::Set(text.to_string())
            }
        }
    };

    errors.sort_by_field_order(&STATUS_UPDATE_FIELDS);
    errors.into_result(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn valid_request() -> SubmissionRequest {
        SubmissionRequest {
            full_name: Some("jane  o'neil".to_string()),
            email: Some("Jane@Example.com".to_string()),
            phone_number: Some("5551234567".to_string()),
            date_of_birth: Some("1960-02-29".to_string()),
            job_title: Some("Shipyard welder".to_string()),
            date_of_diagnosis: Some("2023-11-01".to_string()),
            type_of_diagnosis: Some("mesothelioma".to_string()),
            message: Some("Worked with insulation for 20 years".to_string()),
            type_errors: FieldErrors::new(),
        }
    }

    fn first_message(errors: &FieldErrors) -> &str {
        &errors.iter().next().unwrap().message
    }

    fn status_update(body: Value) -> StatusUpdateRequest {
        StatusUpdateRequest::from_json(body).unwrap()
    }

    #[test]
    fn test_valid_submission_passes() {
        let valid = validate_submission(valid_request(), today()).unwrap();
        assert_eq!(valid.type_of_diagnosis, Some(DiagnosisType::Mesothelioma));
        assert_eq!(valid.date_of_birth, NaiveDate::from_ymd_opt(1960, 2, 29));
    }

    #[test]
    fn test_missing_required_fields_are_reported_together() {
        let request = SubmissionRequest {
            full_name: None,
            email: Some("".to_string()),
            ..valid_request()
        };
        let errors = validate_submission(request, today()).unwrap_err();
        assert_eq!(errors.fields(), vec!["fullName", "email"]);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Full name is required", "Email is required"]);
    }

    #[test]
    fn test_all_violations_are_collected() {
        let request = SubmissionRequest {
            full_name: Some("J".to_string()),
            email: Some("not-an-email".to_string()),
            phone_number: Some("0123".to_string()),
            date_of_birth: Some("2099-01-01".to_string()),
            job_title: Some("x".repeat(101)),
            date_of_diagnosis: Some("1949-12-31".to_string()),
            type_of_diagnosis: Some("flu".to_string()),
            message: Some("m".repeat(2001)),
            type_errors: FieldErrors::new(),
        };
        let errors = validate_submission(request, today()).unwrap_err();
        assert_eq!(errors.fields(), SUBMISSION_FIELDS.to_vec());
    }

    #[test]
    fn test_name_rules() {
        let request = SubmissionRequest {
            full_name: Some("R2-D2".to_string()),
            ..valid_request()
        };
        let errors = validate_submission(request, today()).unwrap_err();
        assert_eq!(
            first_message(&errors),
            "Name can only contain letters, spaces, hyphens, apostrophes, and periods"
        );

        let request = SubmissionRequest {
            full_name: Some("a".repeat(101)),
            ..valid_request()
        };
        let errors = validate_submission(request, today()).unwrap_err();
        assert_eq!(
            first_message(&errors),
            "Name must not exceed 100 characters"
        );

        let request = SubmissionRequest {
            full_name: Some("Dr. Mary-Jane O'Hara".to_string()),
            ..valid_request()
        };
        assert!(validate_submission(request, today()).is_ok());
    }

    #[test]
    fn test_blank_optional_fields_are_absent() {
        let request = SubmissionRequest {
            phone_number: Some("".to_string()),
            date_of_birth: Some("   ".to_string()),
            type_of_diagnosis: Some("".to_string()),
            ..valid_request()
        };
        let valid = validate_submission(request, today()).unwrap();
        assert_eq!(valid.phone_number, None);
        assert_eq!(valid.date_of_birth, None);
        assert_eq!(valid.type_of_diagnosis, None);
    }

    #[test]
    fn test_date_bounds() {
        let check = |date: &str| {
            let request = SubmissionRequest {
                date_of_birth: Some(date.to_string()),
                ..valid_request()
            };
            validate_submission(request, today())
        };

        assert!(check("2024-06-15").is_ok());

        let errors = check("2024-06-16").unwrap_err();
        assert_eq!(
            first_message(&errors),
            "Date of birth cannot be in the future"
        );

        assert!(check("1899-12-31").is_err());

        let errors = check("yesterday").unwrap_err();
        assert_eq!(first_message(&errors), "Date of birth must be a valid date");
    }

    #[test]
    fn test_rfc3339_dates_keep_date_part() {
        assert_eq!(
            parse_date("2020-03-04T10:00:00Z"),
            NaiveDate::from_ymd_opt(2020, 3, 4)
        );
        assert_eq!(parse_date("2020-13-01"), None);
    }

    #[test]
    fn test_eleven_digit_phone_is_accepted() {
        let request = SubmissionRequest {
            phone_number: Some("+15551234567".to_string()),
            ..valid_request()
        };
        assert!(validate_submission(request, today()).is_ok());
    }

    #[test]
    fn test_unknown_body_keys_are_dropped() {
        let body = json!({"fullName": "Jane Doe", "email": "jane@example.com", "isAdmin": true});
        let request = SubmissionRequest::from_json(body).unwrap();
        assert!(validate_submission(request, today()).is_ok());
    }

    #[test]
    fn test_mistyped_fields_are_field_errors() {
        let body = json!({"fullName": 123, "email": "a@b.com", "phoneNumber": ["555"]});
        let request = SubmissionRequest::from_json(body).unwrap();
        let errors = validate_submission(request, today()).unwrap_err();

        assert_eq!(errors.fields(), vec!["fullName", "phoneNumber"]);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["fullName must be a string", "phoneNumber must be a string"]
        );
    }

    #[test]
    fn test_mistyped_field_is_reported_alongside_other_violations() {
        let body = json!({"fullName": false, "email": "nope"});
        let request = SubmissionRequest::from_json(body).unwrap();
        let errors = validate_submission(request, today()).unwrap_err();
        assert_eq!(errors.fields(), vec!["fullName", "email"]);
        assert_eq!(first_message(&errors), "fullName must be a string");
    }

    #[test]
    fn test_null_fields_count_as_absent() {
        let body = json!({"fullName": "Jane Doe", "email": "jane@example.com", "jobTitle": null});
        let request = SubmissionRequest::from_json(body).unwrap();
        let valid = validate_submission(request, today()).unwrap();
        assert_eq!(valid.job_title, None);
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        let errors = SubmissionRequest::from_json(json!(["fullName"])).unwrap_err();
        assert_eq!(errors.fields(), vec!["body"]);
    }

    #[test]
    fn test_list_query_defaults() {
        let query = validate_list_query(ListQueryParams::default()).unwrap();
        assert_eq!(query, ListQuery::default());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort_by, SortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_list_query_bounds() {
        let params = ListQueryParams {
            page: Some("0".to_string()),
            limit: Some("101".to_string()),
            search: Some("s".repeat(101)),
            sort_by: Some("ipAddress".to_string()),
            sort_order: Some("desc".to_string()),
        };
        let errors = validate_list_query(params).unwrap_err();
        assert_eq!(
            errors.fields(),
            vec!["page", "limit", "search", "sortBy", "sortOrder"]
        );

        let params = ListQueryParams {
            page: Some("1.5".to_string()),
            ..Default::default()
        };
        let errors = validate_list_query(params).unwrap_err();
        assert_eq!(first_message(&errors), "page must be an integer");
    }

    #[test]
    fn test_list_query_accepts_explicit_values() {
        let params = ListQueryParams {
            page: Some("3".to_string()),
            limit: Some("100".to_string()),
            search: Some("  Smith ".to_string()),
            sort_by: Some("fullName".to_string()),
            sort_order: Some("ASC".to_string()),
        };
        let query = validate_list_query(params).unwrap();
        assert_eq!(query.page, 3);
        assert_eq!(query.limit, 100);
        assert_eq!(query.search.as_deref(), Some("Smith"));
        assert_eq!(query.sort_by, SortField::FullName);
        assert_eq!(query.sort_order, SortOrder::Asc);
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn test_status_update_distinguishes_absent_and_null_notes() {
        let update = validate_status_update(status_update(json!({"status": "contacted"})));
        let update = update.unwrap();
        assert_eq!(update.status, Some(CaseStatus::Contacted));
        assert_eq!(update.notes, FieldUpdate::Keep);

        let update = validate_status_update(status_update(json!({"notes": null}))).unwrap();
        assert_eq!(update.notes, FieldUpdate::Clear);

        let body = json!({"notes": "  left voicemail "});
        let update = validate_status_update(status_update(body)).unwrap();
        assert_eq!(update.notes, FieldUpdate::Set("left voicemail".to_string()));
    }

    #[test]
    fn test_status_update_rejects_unknown_variants() {
        let body = json!({"status": "archived", "priority": "critical"});
        let errors = validate_status_update(status_update(body)).unwrap_err();
        assert_eq!(errors.fields(), vec!["status", "priority"]);
    }

    #[test]
    fn test_status_update_reports_mistyped_fields() {
        let body = json!({"notes": 42, "status": true});
        let errors = validate_status_update(status_update(body)).unwrap_err();
        assert_eq!(errors.fields(), vec!["status", "notes"]);
    }
}
