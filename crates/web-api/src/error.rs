//! HTTP error mapping.
//!
//! Every failure renders as `{code, message, details?}`. Transport failures
//! are logged here and reported with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use refdata_core::RefDataError;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
        details: Option<JsonValue>,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Unexpected error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. } | Self::NotFound { code, .. } | Self::Conflict { code, .. } => {
                *code
            }
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal_error",
        }
    }
}

impl From<RefDataError> for ApiError {
    fn from(err: RefDataError) -> Self {
        match err {
            RefDataError::Validation(errors) => Self::BadRequest {
                code: "invalid_request",
                message: "Request failed validation".to_string(),
                details: Some(json!({ "issues": errors })),
            },
            RefDataError::Cardinality { .. } => Self::bad_request("cardinality_error", err.to_string()),
            RefDataError::InvalidWeightInput { .. } => {
                Self::bad_request("invalid_weight_input", err.to_string())
            }
            RefDataError::DegenerateAggregate => {
                Self::bad_request("degenerate_aggregate", err.to_string())
            }
            RefDataError::InvalidCursor(_) => Self::bad_request("invalid_cursor", err.to_string()),
            RefDataError::DuplicateConstituent { .. } => Self::Conflict {
                code: "duplicate_constituent",
                message: err.to_string(),
            },
            RefDataError::DuplicatePriceRow { .. } => Self::Conflict {
                code: "duplicate_price_row",
                message: err.to_string(),
            },
            RefDataError::DuplicateJob => Self::Conflict {
                code: "rebalance_conflict",
                message: "Rebalance job already in progress".to_string(),
            },
            RefDataError::SnapshotNotFound => {
                Self::not_found("snapshot_not_found", "No snapshot available")
            }
            RefDataError::JobNotFound => Self::not_found("job_not_found", "Rebalance job not found"),
            RefDataError::Storage(_)
            | RefDataError::Migration(_)
            | RefDataError::CorruptRow { .. }
            | RefDataError::Queue(_)
            | RefDataError::Config(_) => {
                error!(error = %err, "Request failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();
        let message = self.to_string();
        let details = match self {
            Self::BadRequest { details, .. } => details,
            _ => None,
        };
        (status, Json(ErrorResponse { code, message, details })).into_response()
    }
}
