//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chat::ChatError;
use crate::db::DatabaseError;
use crate::llm::LlmError;
use crate::reports::ReportError;
use crate::symptoms::SymptomError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Upstream(detail) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_FAILED",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match &err {
            LlmError::AllModelsExhausted { .. } | LlmError::MalformedOutput { .. } => {
                ApiError::Upstream(err.to_string())
            }
            LlmError::EmptyRequest => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NoRecords => ApiError::NotFound(err.to_string()),
            ChatError::Database(e) => e.into(),
            ChatError::Llm(e) => e.into(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ReportError::NoExtractedText => ApiError::BadRequest(err.to_string()),
            ReportError::Database(e) => e.into(),
            ReportError::Llm(e) => e.into(),
        }
    }
}

impl From<SymptomError> for ApiError {
    fn from(err: SymptomError) -> Self {
        match err {
            SymptomError::InvalidInput(detail) => ApiError::BadRequest(detail),
            SymptomError::Llm(e) => e.into(),
        }
    }
}
