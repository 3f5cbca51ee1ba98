//! Error handling module for the Crosscut admin service.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::RowTable;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const DUPLICATE_NAME: &str = "DUPLICATE_NAME";
    pub const CONFLICT: &str = "CONFLICT";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Admin API key missing or wrong
    Unauthorized(String),
    /// Resource not found, including an empty point lookup
    NotFound(String),
    /// Form or row validation failure, optionally with the annotated rows
    Validation {
        message: String,
        table: Option<RowTable>,
    },
    /// Business-rule name collision
    DuplicateName(String),
    /// Operation already in flight or job already in the requested state
    Conflict(String),
    /// Network or decoding failure talking to a backend
    Transport(String),
    /// A backend answered with a non-success status
    Upstream { status: u16, message: String },
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Shorthand for a validation error without a row table.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            table: None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateName(_) => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation { .. } => codes::VALIDATION_ERROR,
            AppError::DuplicateName(_) => codes::DUPLICATE_NAME,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::Transport(_) => codes::TRANSPORT_ERROR,
            AppError::Upstream { .. } => codes::UPSTREAM_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::DuplicateName(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Transport(msg) => msg.clone(),
            AppError::Upstream { status, message } => format!("{} ({})", message, status),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Transport error: {:?}", err);
        match err.status() {
            Some(status) => AppError::Upstream {
                status: status.as_u16(),
                message: format!("Upstream error: {}", err),
            },
            None => AppError::Transport(format!("Transport error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Transport(format!("JSON error: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        tracing::error!("CSV error: {:?}", err);
        AppError::BadRequest(format!("CSV error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Validation {
                table: Some(table), ..
            } => serde_json::to_value(table).ok(),
            AppError::Upstream { status, .. } => {
                Some(serde_json::json!({ "upstreamStatus": status }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DuplicateName("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::validation("Name required").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Upstream {
                status: 401,
                message: "nope".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_validation_envelope_carries_table() {
        let table = RowTable {
            fields: vec!["name".into(), "cc:ErrorMessage".into()],
            rows: vec![vec!["Clinic".into(), "bad lat".into()]],
        };
        let err = AppError::Validation {
            message: "rows rejected".into(),
            table: Some(table),
        };
        let body = serde_json::to_value(ErrorResponse::new(&err)).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["fields"][1], "cc:ErrorMessage");
        assert_eq!(body["error"]["details"]["rows"][0][1], "bad lat");
    }

    #[test]
    fn test_duplicate_name_has_no_details() {
        let body = serde_json::to_value(ErrorResponse::new(&AppError::DuplicateName(
            "Name is already in use".into(),
        )))
        .unwrap();
        assert_eq!(body["error"]["code"], "DUPLICATE_NAME");
        assert!(body["error"].get("details").is_none());
    }
}
