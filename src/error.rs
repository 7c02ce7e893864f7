use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::CapitalError;
use crate::domain::Decimal;
use crate::engine::LedgerError;
use crate::orchestration::OrchestrationError;

/// One field-level problem with a submitted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &str, message: &str) -> Self {
        ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),
    #[error("Duplicate trade: {trade_id}")]
    DuplicateTrade { trade_id: String },
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<CapitalError> for AppError {
    fn from(err: CapitalError) -> Self {
        match err {
            CapitalError::Db(e) => AppError::Internal(e.to_string()),
            CapitalError::Ledger(LedgerError::InsufficientBalance {
                required,
                available,
            }) => AppError::InsufficientBalance {
                required,
                available,
            },
            CapitalError::PoolNotFound(_)
            | CapitalError::TradeNotFound(_)
            | CapitalError::TagNotFound(_)
            | CapitalError::TransactionNotFound(_) => AppError::NotFound(err.to_string()),
            CapitalError::AlreadyReversed(_)
            | CapitalError::IsReversal(_)
            | CapitalError::TradeLinked(_, _)
            | CapitalError::DuplicateName(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<OrchestrationError> for AppError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Validation(issues) => AppError::Validation(issues),
            OrchestrationError::Duplicate(trade_id) => AppError::DuplicateTrade { trade_id },
            OrchestrationError::Capital(e) => AppError::from(e),
            OrchestrationError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(serde_json::to_value(&issues).unwrap_or_default()),
            ),
            AppError::DuplicateTrade { trade_id } => (
                StatusCode::CONFLICT,
                "Duplicate trade submitted within the recent window".to_string(),
                Some(json!({ "tradeId": trade_id })),
            ),
            AppError::InsufficientBalance {
                required,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Insufficient balance: required {}, available {}",
                    required, available
                ),
                None,
            ),
        };

        let mut body = json!({
            "error": error_message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
