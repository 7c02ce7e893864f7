//! CSV import job records. Parsing happens in an external tool; this service
//! only tracks and lists job outcomes.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "PENDING",
            ImportStatus::Completed => "COMPLETED",
            ImportStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ImportStatus::Pending),
            "COMPLETED" => Some(ImportStatus::Completed),
            "FAILED" => Some(ImportStatus::Failed),
            _ => None,
        }
    }
}

/// One historical CSV import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    pub file_name: String,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub imported_rows: i64,
    pub failed_rows: i64,
    pub created_at_ms: TimeMs,
}
