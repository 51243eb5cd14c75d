use crate::admission::RouteClass;
use crate::response::ApiEnvelope;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::StoreError;
use input_validation::FieldErrors;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Every failure a request can end in
#[derive(Debug, Error)]
pub enum IntakeError {
    // Request contract errors
    #[error("Validation failed")]
    Validation(FieldErrors),
    #[error("Invalid query parameters")]
    InvalidQuery(FieldErrors),
    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    // Admission errors
    #[error("Admission denied for {route_class:?}")]
    AdmissionDenied {
        route_class: RouteClass,
        retry_after: Duration,
    },

    // Lookup errors
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Route {path} not found")]
    RouteNotFound { path: String },

    // Storage errors
    #[error("Generated case identifier collided: {case_id}")]
    DuplicateIdentifier { case_id: String },
    #[error("Storage constraint violated: {0}")]
    ConstraintViolation(String),
    #[error("Storage unavailable: {0}")]
    Connectivity(String),
}

impl IntakeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        IntakeError::MalformedRequest {
            reason: reason.into(),
        }
    }

    /// A query string the extractor could not decode at all
    pub fn unreadable_query(reason: impl Into<String>) -> Self {
        IntakeError::InvalidQuery(FieldErrors::single("query", reason))
    }
}

impl From<FieldErrors> for IntakeError {
    fn from(errors: FieldErrors) -> Self {
        IntakeError::Validation(errors)
    }
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => IntakeError::NotFound("Form entry not found"),
            StoreError::DuplicateIdentifier { case_id } => {
                IntakeError::DuplicateIdentifier { case_id }
            }
            StoreError::ConstraintViolation(detail) => IntakeError::ConstraintViolation(detail),
            StoreError::Connectivity(detail) => IntakeError::Connectivity(detail),
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match &self {
            IntakeError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errors.clone().into_vec()),
            ),
            IntakeError::InvalidQuery(errors) => (
                StatusCode::BAD_REQUEST,
                "Invalid query parameters".to_string(),
                Some(errors.clone().into_vec()),
            ),
            IntakeError::MalformedRequest { reason } => {
                tracing::debug!(reason = %reason, "Rejected malformed request body");
                (StatusCode::BAD_REQUEST, "Invalid request body".to_string(), None)
            }
            IntakeError::AdmissionDenied {
                route_class,
                retry_after,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                route_class.denial_message(*retry_after),
                None,
            ),
            IntakeError::NotFound(message) => (StatusCode::NOT_FOUND, (*message).to_string(), None),
            IntakeError::RouteNotFound { path } => {
                (StatusCode::NOT_FOUND, format!("Route {path} not found"), None)
            }
            // Driver text stays in the logs; callers get generic text
            IntakeError::DuplicateIdentifier { case_id } => {
                let error_id = Uuid::new_v4();
                tracing::error!(
                    error_id = %error_id,
                    case_id = %case_id,
                    "Case identifier collisions exhausted all retries"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not allocate a case identifier, please try again".to_string(),
                    None,
                )
            }
            IntakeError::ConstraintViolation(detail) => {
                let error_id = Uuid::new_v4();
                tracing::warn!(
                    error_id = %error_id,
                    detail = %detail,
                    "Storage constraint violated"
                );
                (
                    StatusCode::BAD_REQUEST,
                    "Submitted data violates a storage constraint".to_string(),
                    None,
                )
            }
            IntakeError::Connectivity(detail) => {
                let error_id = Uuid::new_v4();
                tracing::error!(error_id = %error_id, detail = %detail, "Storage unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database connection failed".to_string(),
                    None,
                )
            }
        };

        let mut response = (status, Json(ApiEnvelope::failure(message, errors))).into_response();

        if let IntakeError::AdmissionDenied { retry_after, .. } = &self {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert!(matches!(IntakeError::from(StoreError::NotFound), IntakeError::NotFound(_)));
        assert!(matches!(
            IntakeError::from(StoreError::Connectivity("pool timed out".into())),
            IntakeError::Connectivity(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (IntakeError::Validation(FieldErrors::new()), StatusCode::BAD_REQUEST),
            (IntakeError::unreadable_query("dup"), StatusCode::BAD_REQUEST),
            (IntakeError::malformed("eof"), StatusCode::BAD_REQUEST),
            (IntakeError::NotFound("Case not found"), StatusCode::NOT_FOUND),
            (IntakeError::ConstraintViolation("len".into()), StatusCode::BAD_REQUEST),
            (IntakeError::Connectivity("io".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                IntakeError::DuplicateIdentifier {
                    case_id: "CASE-1-1".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_admission_denied_sets_retry_after() {
        let response = IntakeError::AdmissionDenied {
            route_class: RouteClass::FormSubmission,
            retry_after: Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
