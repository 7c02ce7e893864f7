use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{page_window, AppState, Pagination};
use crate::db::NewPool;
use crate::domain::{CapitalPool, CapitalTransaction, Decimal, TransactionKind};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDto {
    pub id: String,
    pub name: String,
    pub initial_amount: Decimal,
    pub current_amount: Decimal,
    pub total_invested: Decimal,
    pub total_withdrawn: Decimal,
    pub total_pnl: Decimal,
    pub is_active: bool,
    pub created_at_ms: i64,
}

impl From<CapitalPool> for PoolDto {
    fn from(pool: CapitalPool) -> Self {
        PoolDto {
            id: pool.id,
            name: pool.name,
            initial_amount: pool.initial_amount,
            current_amount: pool.current_amount,
            total_invested: pool.total_invested,
            total_withdrawn: pool.total_withdrawn,
            total_pnl: pool.total_pnl,
            is_active: pool.is_active,
            created_at_ms: pool.created_at_ms.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub pool_id: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub balance_after: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<String>,
    pub created_at_ms: i64,
}

impl From<CapitalTransaction> for TransactionDto {
    fn from(row: CapitalTransaction) -> Self {
        TransactionDto {
            id: row.id,
            pool_id: row.pool_id,
            kind: row.kind,
            amount: row.amount,
            description: row.description,
            trade_id: row.trade_id,
            balance_after: row.balance_after,
            reversed_by: row.reversed_by,
            reverses: row.reverses,
            created_at_ms: row.created_at_ms.as_ms(),
        }
    }
}

// =========================================================================
// Pool setup and maintenance
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub pools: Vec<PoolSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    pub name: String,
    pub initial_amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolsResponse {
    pub pools: Vec<PoolDto>,
}

pub async fn setup_pools(
    State(state): State<AppState>,
    Json(payload): Json<SetupRequest>,
) -> Result<(StatusCode, Json<PoolsResponse>), AppError> {
    if payload.pools.is_empty() {
        return Err(AppError::BadRequest("pools must not be empty".into()));
    }
    let mut specs = Vec::with_capacity(payload.pools.len());
    for (i, spec) in payload.pools.iter().enumerate() {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(format!(
                "pools[{}].name must not be empty",
                i
            )));
        }
        if spec.initial_amount.is_negative() {
            return Err(AppError::BadRequest(format!(
                "pools[{}].initialAmount must not be negative",
                i
            )));
        }
        specs.push(NewPool {
            name: name.to_string(),
            initial_amount: spec.initial_amount,
        });
    }

    let pools = state.repo.create_pools(&specs).await?;
    Ok((
        StatusCode::CREATED,
        Json(PoolsResponse {
            pools: pools.into_iter().map(PoolDto::from).collect(),
        }),
    ))
}

pub async fn list_pools(State(state): State<AppState>) -> Result<Json<PoolsResponse>, AppError> {
    let pools = state.repo.list_pools().await?;
    Ok(Json(PoolsResponse {
        pools: pools.into_iter().map(PoolDto::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePoolRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_pool(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePoolRequest>,
) -> Result<Json<PoolDto>, AppError> {
    let name = match payload.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::BadRequest("name must not be empty".into())),
        other => other,
    };
    let pool = state
        .repo
        .update_pool(&id, name, payload.is_active)
        .await?;
    Ok(Json(PoolDto::from(pool)))
}

// =========================================================================
// Ledger transactions
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub pool_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionDto>,
    pub pagination: Pagination,
}

pub async fn list_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let (page, limit, offset) = page_window(params.page, params.limit);
    let pool_id = params.pool_id.as_deref().filter(|s| !s.is_empty());

    let (rows, total) = state.repo.list_transactions(pool_id, limit, offset).await?;
    Ok(Json(TransactionsResponse {
        transactions: rows.into_iter().map(TransactionDto::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTransactionRequest {
    pub pool_id: String,
    pub kind: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

pub async fn add_transaction(
    State(state): State<AppState>,
    Json(payload): Json<AddTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionDto>), AppError> {
    // transfers only come in pairs through the transfer endpoint
    let kind = TransactionKind::parse(&payload.kind)
        .filter(|k| {
            matches!(
                k,
                TransactionKind::Deposit
                    | TransactionKind::Withdrawal
                    | TransactionKind::Profit
                    | TransactionKind::Loss
            )
        })
        .ok_or_else(|| {
            AppError::BadRequest("kind must be one of DEPOSIT, WITHDRAWAL, PROFIT, LOSS".into())
        })?;
    if !payload.amount.is_positive() {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".into(),
        ));
    }

    let row = state
        .repo
        .apply_transaction(&payload.pool_id, kind, payload.amount, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(TransactionDto::from(row))))
}

pub async fn delete_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransactionDto>, AppError> {
    let compensating = state.repo.reverse_transaction(&id).await?;
    Ok(Json(TransactionDto::from(compensating)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_pool_id: String,
    pub to_pool_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transfer_out: TransactionDto,
    pub transfer_in: TransactionDto,
}

pub async fn transfer(
    State(state): State<AppState>,
    Json(payload): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    if payload.from_pool_id == payload.to_pool_id {
        return Err(AppError::BadRequest(
            "fromPoolId and toPoolId must differ".into(),
        ));
    }
    if !payload.amount.is_positive() {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".into(),
        ));
    }

    let (out_row, in_row) = state
        .repo
        .transfer(
            &payload.from_pool_id,
            &payload.to_pool_id,
            payload.amount,
            payload.description,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TransferResponse {
            transfer_out: TransactionDto::from(out_row),
            transfer_in: TransactionDto::from(in_row),
        }),
    ))
}
