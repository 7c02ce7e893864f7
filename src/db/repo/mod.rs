//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Capital pools and the transaction ledger
//! - `trades.rs` - Trade persistence, queries, and settlement-coupled inserts
//! - `journal.rs` - Predictions and import job history
//!
//! Every pool mutation runs inside a single sqlx transaction spanning the
//! pool read, the ledger-row insert, and the pool update. SQLite's WAL
//! single-writer locking serializes concurrent read-modify-write cycles.

mod journal;
mod trades;

pub use trades::{TradeFilter, TradeSort};

use crate::domain::{CapitalPool, CapitalTransaction, Decimal, TimeMs, TransactionKind};
use crate::engine::{LedgerError, PoolState};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Failures from capital-ledger operations.
#[derive(Debug, Error)]
pub enum CapitalError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("pool not found: {0}")]
    PoolNotFound(String),
    #[error("trade not found: {0}")]
    TradeNotFound(String),
    #[error("tag not found: {0}")]
    TagNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("transaction {0} is already reversed")]
    AlreadyReversed(String),
    #[error("transaction {0} is itself a reversal")]
    IsReversal(String),
    #[error("transaction {0} settles trade {1}; delete the trade to reverse it")]
    TradeLinked(String, String),
    #[error("pool name already in use: {0}")]
    DuplicateName(String),
}

/// Input for capital setup.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPool {
    pub name: String,
    pub initial_amount: Decimal,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap connectivity probe for the readiness endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Pool operations
    // =========================================================================

    /// Create pools from an allocation split, each seeded with an initial
    /// DEPOSIT row so the ledger history covers the starting balance.
    ///
    /// All pools are created in one transaction; a duplicate name aborts the
    /// whole setup.
    pub async fn create_pools(&self, specs: &[NewPool]) -> Result<Vec<CapitalPool>, CapitalError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(specs.len());

        for spec in specs {
            let existing = sqlx::query("SELECT id FROM capital_pools WHERE name = ?")
                .bind(&spec.name)
                .fetch_optional(&mut *tx)
                .await?;
            if existing.is_some() {
                return Err(CapitalError::DuplicateName(spec.name.clone()));
            }

            let pool = CapitalPool {
                id: Uuid::new_v4().to_string(),
                name: spec.name.clone(),
                initial_amount: spec.initial_amount,
                current_amount: spec.initial_amount,
                total_invested: Decimal::zero(),
                total_withdrawn: Decimal::zero(),
                total_pnl: Decimal::zero(),
                is_active: true,
                created_at_ms: TimeMs::now(),
            };

            sqlx::query(
                r#"
                INSERT INTO capital_pools (
                    id, name, initial_amount, current_amount, total_invested,
                    total_withdrawn, total_pnl, is_active, created_at_ms
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&pool.id)
            .bind(&pool.name)
            .bind(pool.initial_amount.to_canonical_string())
            .bind(pool.current_amount.to_canonical_string())
            .bind(pool.total_invested.to_canonical_string())
            .bind(pool.total_withdrawn.to_canonical_string())
            .bind(pool.total_pnl.to_canonical_string())
            .bind(pool.is_active)
            .bind(pool.created_at_ms.as_ms())
            .execute(&mut *tx)
            .await?;

            if pool.initial_amount.is_positive() {
                let seed = CapitalTransaction {
                    id: Uuid::new_v4().to_string(),
                    pool_id: pool.id.clone(),
                    kind: TransactionKind::Deposit,
                    amount: pool.initial_amount,
                    description: Some("Initial allocation".to_string()),
                    trade_id: None,
                    balance_after: pool.initial_amount,
                    reversed_by: None,
                    reverses: None,
                    created_at_ms: pool.created_at_ms,
                };
                insert_transaction_tx(&mut tx, &seed).await?;
            }

            created.push(pool);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Fetch one pool by id.
    pub async fn get_pool(&self, pool_id: &str) -> Result<Option<CapitalPool>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, initial_amount, current_amount, total_invested,
                   total_withdrawn, total_pnl, is_active, created_at_ms
            FROM capital_pools
            WHERE id = ?
            "#,
        )
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| pool_from_row(&r)).transpose()
    }

    /// List all pools, oldest first.
    pub async fn list_pools(&self) -> Result<Vec<CapitalPool>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, initial_amount, current_amount, total_invested,
                   total_withdrawn, total_pnl, is_active, created_at_ms
            FROM capital_pools
            ORDER BY created_at_ms ASC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pool_from_row).collect()
    }

    /// Rename a pool and/or toggle its active flag.
    pub async fn update_pool(
        &self,
        pool_id: &str,
        name: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<CapitalPool, CapitalError> {
        let mut tx = self.pool.begin().await?;
        let mut pool = fetch_pool_tx(&mut tx, pool_id).await?;

        if let Some(new_name) = name {
            if new_name != pool.name {
                let taken = sqlx::query("SELECT id FROM capital_pools WHERE name = ? AND id != ?")
                    .bind(new_name)
                    .bind(pool_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if taken.is_some() {
                    return Err(CapitalError::DuplicateName(new_name.to_string()));
                }
                pool.name = new_name.to_string();
            }
        }
        if let Some(active) = is_active {
            pool.is_active = active;
        }

        sqlx::query("UPDATE capital_pools SET name = ?, is_active = ? WHERE id = ?")
            .bind(&pool.name)
            .bind(pool.is_active)
            .bind(pool_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(pool)
    }

    // =========================================================================
    // Ledger operations
    // =========================================================================

    /// Apply a standalone capital transaction atomically.
    ///
    /// One transaction spans the pool read, the ledger-row insert with its
    /// `balance_after` snapshot, and the pool update.
    pub async fn apply_transaction(
        &self,
        pool_id: &str,
        kind: TransactionKind,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<CapitalTransaction, CapitalError> {
        let mut tx = self.pool.begin().await?;

        let pool = fetch_pool_tx(&mut tx, pool_id).await?;
        let next = pool_state(&pool).apply_external(kind, amount)?;

        let row = CapitalTransaction {
            id: Uuid::new_v4().to_string(),
            pool_id: pool_id.to_string(),
            kind,
            amount,
            description,
            trade_id: None,
            balance_after: next.current_amount,
            reversed_by: None,
            reverses: None,
            created_at_ms: TimeMs::now(),
        };
        insert_transaction_tx(&mut tx, &row).await?;
        store_pool_state_tx(&mut tx, pool_id, &next).await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Reverse a standalone transaction by appending a compensating row.
    ///
    /// The original row is never rewritten beyond the `reversed_by` marker.
    /// Rows that settle a trade are refused; deleting the trade reverses
    /// them as a unit. Compensating rows themselves cannot be reversed.
    pub async fn reverse_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<CapitalTransaction, CapitalError> {
        let mut tx = self.pool.begin().await?;

        let original = fetch_transaction_tx(&mut tx, transaction_id).await?;
        if original.reverses.is_some() {
            return Err(CapitalError::IsReversal(transaction_id.to_string()));
        }
        if original.reversed_by.is_some() {
            return Err(CapitalError::AlreadyReversed(transaction_id.to_string()));
        }
        if let Some(trade_id) = &original.trade_id {
            return Err(CapitalError::TradeLinked(
                transaction_id.to_string(),
                trade_id.clone(),
            ));
        }

        let pool = fetch_pool_tx(&mut tx, &original.pool_id).await?;
        let next = pool_state(&pool).reverse_external(original.kind, original.amount)?;

        let compensating = CapitalTransaction {
            id: Uuid::new_v4().to_string(),
            pool_id: original.pool_id.clone(),
            kind: original.kind.inverse(),
            amount: original.amount,
            description: Some(format!("Reversal of {}", original.id)),
            trade_id: None,
            balance_after: next.current_amount,
            reversed_by: None,
            reverses: Some(original.id.clone()),
            created_at_ms: TimeMs::now(),
        };
        insert_transaction_tx(&mut tx, &compensating).await?;

        sqlx::query("UPDATE capital_transactions SET reversed_by = ? WHERE id = ?")
            .bind(&compensating.id)
            .bind(&original.id)
            .execute(&mut *tx)
            .await?;

        store_pool_state_tx(&mut tx, &original.pool_id, &next).await?;

        tx.commit().await?;
        Ok(compensating)
    }

    /// Move an amount between two pools as a TRANSFER_OUT / TRANSFER_IN pair
    /// in one transaction.
    pub async fn transfer(
        &self,
        from_pool_id: &str,
        to_pool_id: &str,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<(CapitalTransaction, CapitalTransaction), CapitalError> {
        let mut tx = self.pool.begin().await?;

        let from_pool = fetch_pool_tx(&mut tx, from_pool_id).await?;
        let to_pool = fetch_pool_tx(&mut tx, to_pool_id).await?;

        let from_next = pool_state(&from_pool).apply_external(TransactionKind::TransferOut, amount)?;
        let to_next = pool_state(&to_pool).apply_external(TransactionKind::TransferIn, amount)?;

        let now = TimeMs::now();
        let out_row = CapitalTransaction {
            id: Uuid::new_v4().to_string(),
            pool_id: from_pool_id.to_string(),
            kind: TransactionKind::TransferOut,
            amount,
            description: description
                .clone()
                .or_else(|| Some(format!("Transfer to {}", to_pool.name))),
            trade_id: None,
            balance_after: from_next.current_amount,
            reversed_by: None,
            reverses: None,
            created_at_ms: now,
        };
        let in_row = CapitalTransaction {
            id: Uuid::new_v4().to_string(),
            pool_id: to_pool_id.to_string(),
            kind: TransactionKind::TransferIn,
            amount,
            description: description.or_else(|| Some(format!("Transfer from {}", from_pool.name))),
            trade_id: None,
            balance_after: to_next.current_amount,
            reversed_by: None,
            reverses: None,
            created_at_ms: now,
        };

        insert_transaction_tx(&mut tx, &out_row).await?;
        insert_transaction_tx(&mut tx, &in_row).await?;
        store_pool_state_tx(&mut tx, from_pool_id, &from_next).await?;
        store_pool_state_tx(&mut tx, to_pool_id, &to_next).await?;

        tx.commit().await?;
        Ok((out_row, in_row))
    }

    /// List ledger rows, newest first, optionally scoped to one pool.
    pub async fn list_transactions(
        &self,
        pool_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CapitalTransaction>, i64), sqlx::Error> {
        let (sql, count_sql, binds_pool) = if pool_id.is_some() {
            (
                r#"
                SELECT id, pool_id, kind, amount, description, trade_id,
                       balance_after, reversed_by, reverses, created_at_ms
                FROM capital_transactions
                WHERE pool_id = ?
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM capital_transactions WHERE pool_id = ?",
                true,
            )
        } else {
            (
                r#"
                SELECT id, pool_id, kind, amount, description, trade_id,
                       balance_after, reversed_by, reverses, created_at_ms
                FROM capital_transactions
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM capital_transactions",
                false,
            )
        };

        let mut query = sqlx::query(sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
        if binds_pool {
            let id = pool_id.unwrap_or_default();
            query = query.bind(id);
            count_query = count_query.bind(id);
        }

        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total = count_query.fetch_one(&self.pool).await?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((transactions, total))
    }
}

// =========================================================================
// Transaction-scoped helpers (shared with trades.rs)
// =========================================================================

fn pool_state(pool: &CapitalPool) -> PoolState {
    PoolState {
        current_amount: pool.current_amount,
        total_invested: pool.total_invested,
        total_withdrawn: pool.total_withdrawn,
        total_pnl: pool.total_pnl,
    }
}

async fn fetch_pool_tx(
    tx: &mut Transaction<'_, Sqlite>,
    pool_id: &str,
) -> Result<CapitalPool, CapitalError> {
    let row = sqlx::query(
        r#"
        SELECT id, name, initial_amount, current_amount, total_invested,
               total_withdrawn, total_pnl, is_active, created_at_ms
        FROM capital_pools
        WHERE id = ?
        "#,
    )
    .bind(pool_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(r) => Ok(pool_from_row(&r)?),
        None => Err(CapitalError::PoolNotFound(pool_id.to_string())),
    }
}

async fn fetch_transaction_tx(
    tx: &mut Transaction<'_, Sqlite>,
    transaction_id: &str,
) -> Result<CapitalTransaction, CapitalError> {
    let row = sqlx::query(
        r#"
        SELECT id, pool_id, kind, amount, description, trade_id,
               balance_after, reversed_by, reverses, created_at_ms
        FROM capital_transactions
        WHERE id = ?
        "#,
    )
    .bind(transaction_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(r) => Ok(transaction_from_row(&r)?),
        None => Err(CapitalError::TransactionNotFound(transaction_id.to_string())),
    }
}

async fn insert_transaction_tx(
    tx: &mut Transaction<'_, Sqlite>,
    row: &CapitalTransaction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO capital_transactions (
            id, pool_id, kind, amount, description, trade_id,
            balance_after, reversed_by, reverses, created_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.pool_id)
    .bind(row.kind.as_str())
    .bind(row.amount.to_canonical_string())
    .bind(row.description.as_deref())
    .bind(row.trade_id.as_deref())
    .bind(row.balance_after.to_canonical_string())
    .bind(row.reversed_by.as_deref())
    .bind(row.reverses.as_deref())
    .bind(row.created_at_ms.as_ms())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn store_pool_state_tx(
    tx: &mut Transaction<'_, Sqlite>,
    pool_id: &str,
    state: &PoolState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE capital_pools
        SET current_amount = ?, total_invested = ?, total_withdrawn = ?, total_pnl = ?
        WHERE id = ?
        "#,
    )
    .bind(state.current_amount.to_canonical_string())
    .bind(state.total_invested.to_canonical_string())
    .bind(state.total_withdrawn.to_canonical_string())
    .bind(state.total_pnl.to_canonical_string())
    .bind(pool_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =========================================================================
// Row mapping
// =========================================================================

/// Parse a stored decimal column, logging and defaulting on corruption.
fn parse_decimal_col(value: &str, column: &str, row_id: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!(
            column = column,
            value = value,
            id = row_id,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}

fn pool_from_row(row: &SqliteRow) -> Result<CapitalPool, sqlx::Error> {
    let id: String = row.get("id");
    let initial: String = row.get("initial_amount");
    let current: String = row.get("current_amount");
    let invested: String = row.get("total_invested");
    let withdrawn: String = row.get("total_withdrawn");
    let pnl: String = row.get("total_pnl");

    Ok(CapitalPool {
        initial_amount: parse_decimal_col(&initial, "initial_amount", &id),
        current_amount: parse_decimal_col(&current, "current_amount", &id),
        total_invested: parse_decimal_col(&invested, "total_invested", &id),
        total_withdrawn: parse_decimal_col(&withdrawn, "total_withdrawn", &id),
        total_pnl: parse_decimal_col(&pnl, "total_pnl", &id),
        name: row.get("name"),
        is_active: row.get("is_active"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
        id,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<CapitalTransaction, sqlx::Error> {
    let id: String = row.get("id");
    let kind_str: String = row.get("kind");
    let kind = TransactionKind::parse(&kind_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown transaction kind: {}", kind_str).into())
    })?;
    let amount: String = row.get("amount");
    let balance_after: String = row.get("balance_after");

    Ok(CapitalTransaction {
        kind,
        amount: parse_decimal_col(&amount, "amount", &id),
        balance_after: parse_decimal_col(&balance_after, "balance_after", &id),
        pool_id: row.get("pool_id"),
        description: row.get("description"),
        trade_id: row.get("trade_id"),
        reversed_by: row.get("reversed_by"),
        reverses: row.get("reverses"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
        id,
    })
}
