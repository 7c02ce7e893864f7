use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{page_window, AppState, Pagination};
use crate::domain::{ImportJob, ImportStatus};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobDto {
    pub id: String,
    pub file_name: String,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub imported_rows: i64,
    pub failed_rows: i64,
    pub created_at_ms: i64,
}

impl From<ImportJob> for ImportJobDto {
    fn from(job: ImportJob) -> Self {
        ImportJobDto {
            id: job.id,
            file_name: job.file_name,
            status: job.status,
            total_rows: job.total_rows,
            imported_rows: job.imported_rows,
            failed_rows: job.failed_rows,
            created_at_ms: job.created_at_ms.as_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvHistoryQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvHistoryResponse {
    pub imports: Vec<ImportJobDto>,
    pub pagination: Pagination,
}

pub async fn csv_history(
    Query(params): Query<CsvHistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<CsvHistoryResponse>, AppError> {
    let (page, limit, offset) = page_window(params.page, params.limit);
    let status = match params.status.as_deref() {
        Some("") | None => None,
        Some(s) => Some(
            ImportStatus::parse(s).ok_or_else(|| AppError::BadRequest("Invalid status".into()))?,
        ),
    };

    let (rows, total) = state.repo.query_import_jobs(status, limit, offset).await?;
    Ok(Json(CsvHistoryResponse {
        imports: rows.into_iter().map(ImportJobDto::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}
