pub mod capital;
pub mod health;
pub mod imports;
pub mod predictions;
pub mod trades;

use crate::db::Repository;
use crate::orchestration::Orchestrator;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { repo, orchestrator }
    }
}

/// Paging block returned by every list endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Pagination {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Normalize raw page/limit query values: 1-based page, limit clamped to
/// 1..=100, default 50. Returns (page, limit, offset).
pub(crate) fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(50).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/api/trades",
            get(trades::list_trades).post(trades::create_trade),
        )
        .route(
            "/api/trades/:id",
            get(trades::get_trade).delete(trades::delete_trade),
        )
        .route("/api/capital/setup", post(capital::setup_pools))
        .route("/api/capital/pools", get(capital::list_pools))
        .route("/api/capital/pools/:id", put(capital::update_pool))
        .route(
            "/api/capital/transactions",
            get(capital::list_transactions).post(capital::add_transaction),
        )
        .route(
            "/api/capital/transactions/:id",
            delete(capital::delete_transaction),
        )
        .route("/api/capital/transfer", post(capital::transfer))
        .route(
            "/api/predictions",
            get(predictions::list_predictions).post(predictions::create_prediction),
        )
        .route("/api/predictions/:id", put(predictions::update_prediction))
        .route("/api/symbols/csv-history", get(imports::csv_history))
        .layer(cors)
        .with_state(state)
}
