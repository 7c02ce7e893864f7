use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::capital::TransactionDto;
use super::{page_window, AppState, Pagination};
use crate::db::{TradeFilter, TradeSort};
use crate::domain::{
    Decimal, HedgePosition, Instrument, OptionDetails, Tag, Trade, TradeCharges, TradeSide,
};
use crate::error::AppError;
use crate::orchestration::TradeDraft;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub instrument_type: Option<String>,
    pub side: Option<String>,
    pub strategy: Option<String>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub trades: Vec<TradeDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTradeResponse {
    pub deleted: TradeDto,
    pub reversals: Vec<TransactionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub id: String,
    pub symbol: String,
    pub instrument_type: String,
    pub side: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
    pub entry_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time_ms: Option<i64>,
    pub entry_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_value: Option<Decimal>,
    pub turnover: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_return: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    pub created_at_ms: i64,
    pub charges: TradeCharges,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_details: Option<OptionDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hedge: Option<HedgePosition>,
    pub tags: Vec<TagDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: String,
    pub name: String,
    pub kind: String,
}

impl From<Tag> for TagDto {
    fn from(tag: Tag) -> Self {
        TagDto {
            id: tag.id,
            name: tag.name,
            kind: tag.kind.as_str().to_string(),
        }
    }
}

impl From<Trade> for TradeDto {
    fn from(trade: Trade) -> Self {
        let turnover = trade.turnover();
        TradeDto {
            id: trade.id,
            symbol: trade.symbol,
            instrument_type: trade.instrument.as_str().to_string(),
            side: trade.side.as_str().to_string(),
            quantity: trade.quantity,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            entry_time_ms: trade.entry_time_ms.as_ms(),
            exit_time_ms: trade.exit_time_ms.map(|t| t.as_ms()),
            entry_value: trade.entry_value,
            exit_value: trade.exit_value,
            turnover,
            gross_pnl: trade.gross_pnl,
            net_pnl: trade.net_pnl,
            percentage_return: trade.return_pct,
            strategy: trade.strategy,
            notes: trade.notes,
            pool_id: trade.pool_id,
            created_at_ms: trade.created_at_ms.as_ms(),
            charges: trade.charges,
            option_details: trade.option_details,
            hedge: trade.hedge,
            tags: trade.tags.into_iter().map(TagDto::from).collect(),
        }
    }
}

pub async fn list_trades(
    Query(params): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let (page, limit, offset) = page_window(params.page, params.limit);

    let instrument = match params.instrument_type.as_deref() {
        Some("") | None => None,
        Some(s) => Some(
            Instrument::parse(s).ok_or_else(|| AppError::BadRequest("Invalid instrumentType".into()))?,
        ),
    };
    let side = match params.side.as_deref() {
        Some("") | None => None,
        Some(s) => {
            Some(TradeSide::parse(s).ok_or_else(|| AppError::BadRequest("Invalid side".into()))?)
        }
    };
    let sort = match params.sort_by.as_deref() {
        Some("") | None => TradeSort::EntryTime,
        Some(s) => TradeSort::parse(s).ok_or_else(|| AppError::BadRequest("Invalid sortBy".into()))?,
    };
    let descending = match params.sort_order.as_deref() {
        Some("asc") => false,
        Some("desc") | Some("") | None => true,
        Some(_) => return Err(AppError::BadRequest("Invalid sortOrder".into())),
    };
    if let (Some(from), Some(to)) = (params.date_from, params.date_to) {
        if from > to {
            return Err(AppError::BadRequest("dateFrom must be <= dateTo".into()));
        }
    }

    let filter = TradeFilter {
        search: params.search.filter(|s| !s.is_empty()),
        instrument,
        side,
        strategy: params.strategy.filter(|s| !s.is_empty()),
        date_from: params.date_from,
        date_to: params.date_to,
        sort,
        descending,
        limit,
        offset,
    };
    let (trades, total) = state.repo.query_trades(&filter).await?;

    Ok(Json(TradesResponse {
        trades: trades.into_iter().map(TradeDto::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

pub async fn create_trade(
    State(state): State<AppState>,
    Json(draft): Json<TradeDraft>,
) -> Result<(StatusCode, Json<TradeDto>), AppError> {
    let recorded = state.orchestrator.record_trade(draft).await?;
    Ok((StatusCode::CREATED, Json(TradeDto::from(recorded.trade))))
}

pub async fn get_trade(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TradeDto>, AppError> {
    let trade = state
        .repo
        .get_trade(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Trade not found: {}", id)))?;
    Ok(Json(TradeDto::from(trade)))
}

pub async fn delete_trade(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DeleteTradeResponse>, AppError> {
    let (trade, reversals) = state.repo.delete_trade_atomic(&id).await?;
    Ok(Json(DeleteTradeResponse {
        deleted: TradeDto::from(trade),
        reversals: reversals.into_iter().map(TransactionDto::from).collect(),
    }))
}
