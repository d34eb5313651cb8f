use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Unified service error type used across all modules.
///
/// Each variant maps to an HTTP status code. The JSON response carries a
/// short human-readable message and, where the failing check produced one,
/// a detail string:
///
/// ```json
/// {"error": "Over-allocation prevented", "details": "Bin (1,2,3) capacity: 10. Current: 8. Cannot add 5."}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Resource does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / resource already exists. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// A quantity or volume ceiling would be breached. HTTP 400.
    /// `details` is rendered verbatim in the response body.
    #[error("{message}")]
    CapacityExceeded { message: String, details: String },

    /// A storage dependency is missing (schema not initialised). HTTP 503.
    #[error("{0}")]
    Unavailable(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The detail string attached to the failing check, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            ServiceError::CapacityExceeded { details, .. } => Some(details),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
        });
        if let Some(details) = self.details() {
            body["details"] = serde_json::Value::String(details.to_string());
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::CapacityExceeded { message: "x".into(), details: "y".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::Unavailable("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ServiceError::Storage("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ServiceError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("Bin not found".into()).to_string(), "Bin not found");
        assert_eq!(
            ServiceError::CapacityExceeded {
                message: "Over-allocation prevented".into(),
                details: "capacity: 10".into(),
            }
            .to_string(),
            "Over-allocation prevented"
        );
    }

    #[test]
    fn details_only_on_capacity_errors() {
        assert!(ServiceError::Validation("x".into()).details().is_none());
        let err = ServiceError::CapacityExceeded {
            message: "Over-allocation prevented".into(),
            details: "Bin (0,0,0) capacity: 10. Current: 8. Cannot add 5.".into(),
        };
        assert_eq!(err.details(), Some("Bin (0,0,0) capacity: 10. Current: 8. Cannot add 5."));
    }

    #[test]
    fn json_response_format() {
        let err = ServiceError::NotFound("Section not found".into());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
