use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{page_window, AppState, Pagination};
use crate::domain::{Direction, Prediction, PredictionStatus, TimeMs};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDto {
    pub id: String,
    pub strategy: String,
    pub direction: Direction,
    pub confidence: i64,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at_ms: i64,
}

impl From<Prediction> for PredictionDto {
    fn from(p: Prediction) -> Self {
        PredictionDto {
            id: p.id,
            strategy: p.strategy,
            direction: p.direction,
            confidence: p.confidence,
            status: p.status,
            result: p.result,
            notes: p.notes,
            created_at_ms: p.created_at_ms.as_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsResponse {
    pub predictions: Vec<PredictionDto>,
    pub pagination: Pagination,
}

pub async fn list_predictions(
    Query(params): Query<PredictionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PredictionsResponse>, AppError> {
    let (page, limit, offset) = page_window(params.page, params.limit);
    let status = match params.status.as_deref() {
        Some("") | None => None,
        Some(s) => Some(
            PredictionStatus::parse(s).ok_or_else(|| AppError::BadRequest("Invalid status".into()))?,
        ),
    };

    let (rows, total) = state.repo.query_predictions(status, limit, offset).await?;
    Ok(Json(PredictionsResponse {
        predictions: rows.into_iter().map(PredictionDto::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePredictionRequest {
    pub strategy: String,
    pub direction: String,
    pub confidence: i64,
    pub notes: Option<String>,
}

pub async fn create_prediction(
    State(state): State<AppState>,
    Json(payload): Json<CreatePredictionRequest>,
) -> Result<(StatusCode, Json<PredictionDto>), AppError> {
    let strategy = payload.strategy.trim();
    if strategy.is_empty() {
        return Err(AppError::BadRequest("strategy must not be empty".into()));
    }
    let direction = Direction::parse(&payload.direction).ok_or_else(|| {
        AppError::BadRequest("direction must be one of BULLISH, BEARISH, NEUTRAL".into())
    })?;
    if !(1..=10).contains(&payload.confidence) {
        return Err(AppError::BadRequest("confidence must be between 1 and 10".into()));
    }

    let prediction = Prediction {
        id: Uuid::new_v4().to_string(),
        strategy: strategy.to_string(),
        direction,
        confidence: payload.confidence,
        status: PredictionStatus::Pending,
        result: None,
        notes: payload.notes,
        created_at_ms: TimeMs::now(),
    };
    state.repo.insert_prediction(&prediction).await?;
    Ok((StatusCode::CREATED, Json(PredictionDto::from(prediction))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePredictionRequest {
    pub status: Option<String>,
    pub result: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_prediction(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePredictionRequest>,
) -> Result<Json<PredictionDto>, AppError> {
    let status = match payload.status.as_deref() {
        Some(s) => Some(PredictionStatus::parse(s).ok_or_else(|| {
            AppError::BadRequest("status must be one of PENDING, PASSED, FAILED".into())
        })?),
        None => None,
    };

    let updated = state
        .repo
        .update_prediction(&id, status, payload.result.as_deref(), payload.notes.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Prediction not found: {}", id)))?;
    Ok(Json(PredictionDto::from(updated)))
}
