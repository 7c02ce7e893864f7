//! Trade persistence: atomic insert with settlement, filtered queries with
//! batched hydration, and compensated deletes.

use super::{
    fetch_pool_tx, insert_transaction_tx, parse_decimal_col, pool_state, store_pool_state_tx,
    transaction_from_row, CapitalError, Repository,
};
use crate::domain::{
    CapitalTransaction, Decimal, HedgePosition, Instrument, OptionDetails, Tag, TagKind, TagRef,
    TimeMs, Trade, TradeCharges, TradeSide, TransactionKind,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

// SQLite has a 999 parameter limit; chunk to 500 for safety margin.
const CHUNK_SIZE: usize = 500;

const TRADE_COLUMNS: &str = "id, symbol, instrument, side, quantity, entry_price, exit_price, \
     entry_time_ms, exit_time_ms, entry_value, exit_value, gross_pnl, net_pnl, return_pct, \
     strategy, notes, pool_id, fingerprint, created_at_ms";

/// Sort keys accepted by the trade list query.
///
/// Numeric columns are stored as canonical decimal strings; those sort
/// through a REAL cast so "9" orders below "10".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSort {
    EntryTime,
    Symbol,
    NetPnl,
    Quantity,
    CreatedAt,
}

impl TradeSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entryTime" => Some(TradeSort::EntryTime),
            "symbol" => Some(TradeSort::Symbol),
            "netPnl" => Some(TradeSort::NetPnl),
            "quantity" => Some(TradeSort::Quantity),
            "createdAt" => Some(TradeSort::CreatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            TradeSort::EntryTime => "entry_time_ms",
            TradeSort::Symbol => "symbol",
            TradeSort::NetPnl => "CAST(net_pnl AS REAL)",
            TradeSort::Quantity => "CAST(quantity AS REAL)",
            TradeSort::CreatedAt => "created_at_ms",
        }
    }
}

/// Filter, sort, and page parameters for the trade list query.
#[derive(Debug, Clone)]
pub struct TradeFilter {
    /// Case-insensitive substring match on symbol or notes.
    pub search: Option<String>,
    pub instrument: Option<Instrument>,
    pub side: Option<TradeSide>,
    pub strategy: Option<String>,
    /// Inclusive lower bound on entry time, epoch ms.
    pub date_from: Option<i64>,
    /// Inclusive upper bound on entry time, epoch ms.
    pub date_to: Option<i64>,
    pub sort: TradeSort,
    pub descending: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TradeFilter {
    fn default() -> Self {
        TradeFilter {
            search: None,
            instrument: None,
            side: None,
            strategy: None,
            date_from: None,
            date_to: None,
            sort: TradeSort::EntryTime,
            descending: true,
            limit: 50,
            offset: 0,
        }
    }
}

impl Repository {
    /// Insert a trade with its sub-records, resolve its tags, and settle it
    /// against its pool, all in one transaction.
    ///
    /// Returns the resolved tags and the ledger rows written. Any failure,
    /// including an insufficient pool balance, rolls back the whole insert.
    pub async fn insert_trade_atomic(
        &self,
        trade: &Trade,
        tag_refs: &[TagRef],
    ) -> Result<(Vec<Tag>, Vec<CapitalTransaction>), CapitalError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, symbol, instrument, side, quantity, entry_price, exit_price,
                entry_time_ms, exit_time_ms, entry_value, exit_value, gross_pnl,
                net_pnl, return_pct, strategy, notes, pool_id, fingerprint, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.symbol)
        .bind(trade.instrument.as_str())
        .bind(trade.side.as_str())
        .bind(trade.quantity.to_canonical_string())
        .bind(trade.entry_price.to_canonical_string())
        .bind(trade.exit_price.map(|d| d.to_canonical_string()))
        .bind(trade.entry_time_ms.as_ms())
        .bind(trade.exit_time_ms.map(|t| t.as_ms()))
        .bind(trade.entry_value.to_canonical_string())
        .bind(trade.exit_value.map(|d| d.to_canonical_string()))
        .bind(trade.gross_pnl.map(|d| d.to_canonical_string()))
        .bind(trade.net_pnl.map(|d| d.to_canonical_string()))
        .bind(trade.return_pct.map(|d| d.to_canonical_string()))
        .bind(trade.strategy.as_deref())
        .bind(trade.notes.as_deref())
        .bind(trade.pool_id.as_deref())
        .bind(&trade.fingerprint)
        .bind(trade.created_at_ms.as_ms())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO trade_charges (
                trade_id, brokerage, stt, exchange, sebi, stamp_duty, gst, total
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.id)
        .bind(trade.charges.brokerage.to_canonical_string())
        .bind(trade.charges.stt.to_canonical_string())
        .bind(trade.charges.exchange.to_canonical_string())
        .bind(trade.charges.sebi.to_canonical_string())
        .bind(trade.charges.stamp_duty.to_canonical_string())
        .bind(trade.charges.gst.to_canonical_string())
        .bind(trade.charges.total.to_canonical_string())
        .execute(&mut *tx)
        .await?;

        if let Some(option) = &trade.option_details {
            sqlx::query(
                r#"
                INSERT INTO option_details (trade_id, strike_price, expiry_ms, lot_size, underlying)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&trade.id)
            .bind(option.strike_price.to_canonical_string())
            .bind(option.expiry_ms.as_ms())
            .bind(option.lot_size)
            .bind(option.underlying.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(hedge) = &trade.hedge {
            sqlx::query(
                r#"
                INSERT INTO hedge_positions (trade_id, quantity, entry_price, exit_price)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&trade.id)
            .bind(hedge.quantity.to_canonical_string())
            .bind(hedge.entry_price.to_canonical_string())
            .bind(hedge.exit_price.map(|d| d.to_canonical_string()))
            .execute(&mut *tx)
            .await?;
        }

        let tags = resolve_tags_tx(&mut tx, &trade.id, tag_refs).await?;
        let settlements = settle_trade_tx(&mut tx, trade).await?;

        tx.commit().await?;
        Ok((tags, settlements))
    }

    /// Fetch one trade with all sub-records, or None.
    pub async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, sqlx::Error> {
        let sql = format!("SELECT {} FROM trades WHERE id = ?", TRADE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await?;

        let trade = match row {
            Some(r) => trade_from_row(&r)?,
            None => return Ok(None),
        };
        let mut trades = vec![trade];
        self.hydrate_trades(&mut trades).await?;
        Ok(trades.pop())
    }

    /// Most recent trade id with this fingerprint created at or after
    /// `since_ms`, for the duplicate-submission guard.
    pub async fn find_recent_by_fingerprint(
        &self,
        fingerprint: &str,
        since_ms: i64,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id FROM trades
            WHERE fingerprint = ? AND created_at_ms >= ?
            ORDER BY created_at_ms DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(fingerprint)
        .bind(since_ms)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("id")))
    }

    /// Filtered, sorted, paged trade listing with the total match count.
    pub async fn query_trades(
        &self,
        filter: &TradeFilter,
    ) -> Result<(Vec<Trade>, i64), sqlx::Error> {
        let mut conditions: Vec<&str> = Vec::new();
        if filter.search.is_some() {
            conditions.push("(symbol LIKE ? OR notes LIKE ?)");
        }
        if filter.instrument.is_some() {
            conditions.push("instrument = ?");
        }
        if filter.side.is_some() {
            conditions.push("side = ?");
        }
        if filter.strategy.is_some() {
            conditions.push("strategy = ?");
        }
        if filter.date_from.is_some() {
            conditions.push("entry_time_ms >= ?");
        }
        if filter.date_to.is_some() {
            conditions.push("entry_time_ms <= ?");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let direction = if filter.descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM trades{} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            TRADE_COLUMNS,
            where_clause,
            filter.sort.column(),
            direction
        );
        let count_sql = format!("SELECT COUNT(*) FROM trades{}", where_clause);

        let search_pattern = filter.search.as_ref().map(|s| format!("%{}%", s));

        let mut query = sqlx::query(&sql);
        if let Some(pattern) = &search_pattern {
            query = query.bind(pattern.as_str()).bind(pattern.as_str());
        }
        if let Some(instrument) = filter.instrument {
            query = query.bind(instrument.as_str());
        }
        if let Some(side) = filter.side {
            query = query.bind(side.as_str());
        }
        if let Some(strategy) = &filter.strategy {
            query = query.bind(strategy.as_str());
        }
        if let Some(from) = filter.date_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.date_to {
            query = query.bind(to);
        }
        let rows = query
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        // count repeats the filter binds without paging
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(pattern) = &search_pattern {
            count_query = count_query.bind(pattern.as_str()).bind(pattern.as_str());
        }
        if let Some(instrument) = filter.instrument {
            count_query = count_query.bind(instrument.as_str());
        }
        if let Some(side) = filter.side {
            count_query = count_query.bind(side.as_str());
        }
        if let Some(strategy) = &filter.strategy {
            count_query = count_query.bind(strategy.as_str());
        }
        if let Some(from) = filter.date_from {
            count_query = count_query.bind(from);
        }
        if let Some(to) = filter.date_to {
            count_query = count_query.bind(to);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut trades = rows
            .iter()
            .map(trade_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.hydrate_trades(&mut trades).await?;
        Ok((trades, total))
    }

    /// Delete a trade, first appending compensating ledger rows for any live
    /// settlement it wrote. Returns the deleted trade and those rows.
    pub async fn delete_trade_atomic(
        &self,
        trade_id: &str,
    ) -> Result<(Trade, Vec<CapitalTransaction>), CapitalError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM trades WHERE id = ?", TRADE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(trade_id)
            .fetch_optional(&mut *tx)
            .await?;
        let trade = match row {
            Some(r) => trade_from_row(&r)?,
            None => return Err(CapitalError::TradeNotFound(trade_id.to_string())),
        };

        let reversals = unwind_trade_tx(&mut tx, trade_id).await?;

        // sub-records and tag links cascade
        sqlx::query("DELETE FROM trades WHERE id = ?")
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((trade, reversals))
    }

    /// Attach charges, option details, hedges, and tags to bare trade rows.
    async fn hydrate_trades(&self, trades: &mut [Trade]) -> Result<(), sqlx::Error> {
        if trades.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = trades.iter().map(|t| t.id.clone()).collect();
        let mut charges_by_trade: HashMap<String, TradeCharges> = HashMap::new();
        let mut options_by_trade: HashMap<String, OptionDetails> = HashMap::new();
        let mut hedges_by_trade: HashMap<String, HedgePosition> = HashMap::new();
        let mut tags_by_trade: HashMap<String, Vec<Tag>> = HashMap::new();

        for chunk in ids.chunks(CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");

            let sql = format!(
                "SELECT trade_id, brokerage, stt, exchange, sebi, stamp_duty, gst, total \
                 FROM trade_charges WHERE trade_id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            for row in query.fetch_all(&self.pool).await? {
                let trade_id: String = row.get("trade_id");
                let charges = charges_from_row(&row, &trade_id);
                charges_by_trade.insert(trade_id, charges);
            }

            let sql = format!(
                "SELECT trade_id, strike_price, expiry_ms, lot_size, underlying \
                 FROM option_details WHERE trade_id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            for row in query.fetch_all(&self.pool).await? {
                let trade_id: String = row.get("trade_id");
                let strike: String = row.get("strike_price");
                let option = OptionDetails {
                    strike_price: parse_decimal_col(&strike, "strike_price", &trade_id),
                    expiry_ms: TimeMs::new(row.get("expiry_ms")),
                    lot_size: row.get("lot_size"),
                    underlying: row.get("underlying"),
                };
                options_by_trade.insert(trade_id, option);
            }

            let sql = format!(
                "SELECT trade_id, quantity, entry_price, exit_price \
                 FROM hedge_positions WHERE trade_id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            for row in query.fetch_all(&self.pool).await? {
                let trade_id: String = row.get("trade_id");
                let quantity: String = row.get("quantity");
                let entry_price: String = row.get("entry_price");
                let hedge = HedgePosition {
                    quantity: parse_decimal_col(&quantity, "quantity", &trade_id),
                    entry_price: parse_decimal_col(&entry_price, "entry_price", &trade_id),
                    exit_price: row
                        .get::<Option<String>, _>("exit_price")
                        .map(|v| parse_decimal_col(&v, "exit_price", &trade_id)),
                };
                hedges_by_trade.insert(trade_id, hedge);
            }

            let sql = format!(
                "SELECT tt.trade_id, t.id, t.name, t.kind, t.created_at_ms \
                 FROM trade_tags tt JOIN tags t ON t.id = tt.tag_id \
                 WHERE tt.trade_id IN ({}) ORDER BY t.name ASC",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            for row in query.fetch_all(&self.pool).await? {
                let trade_id: String = row.get("trade_id");
                tags_by_trade
                    .entry(trade_id)
                    .or_default()
                    .push(tag_from_row(&row)?);
            }
        }

        for trade in trades.iter_mut() {
            trade.charges = match charges_by_trade.remove(&trade.id) {
                Some(charges) => charges,
                None => {
                    warn!(trade_id = %trade.id, "Missing charges row for trade, defaulting to zero");
                    TradeCharges::default()
                }
            };
            trade.option_details = options_by_trade.remove(&trade.id);
            trade.hedge = hedges_by_trade.remove(&trade.id);
            trade.tags = tags_by_trade.remove(&trade.id).unwrap_or_default();
        }
        Ok(())
    }
}

// =========================================================================
// Settlement
// =========================================================================

/// Write the ledger rows for a newly recorded trade inside the caller's
/// transaction. Returns the rows in the order written.
///
/// Positional trades withdraw the entry value up front; closed ones also
/// return the principal and record the net P&L. Intraday options trades are
/// margin-settled, so only the P&L row is written. Trades without a pool
/// write nothing.
async fn settle_trade_tx(
    tx: &mut Transaction<'_, Sqlite>,
    trade: &Trade,
) -> Result<Vec<CapitalTransaction>, CapitalError> {
    let pool_id = match trade.pool_id.as_deref() {
        Some(id) => id,
        None => return Ok(Vec::new()),
    };

    let pool = fetch_pool_tx(tx, pool_id).await?;
    let mut state = pool_state(&pool);
    let mut rows: Vec<CapitalTransaction> = Vec::new();
    let now = TimeMs::now();

    let margin_settled = trade.instrument == Instrument::Options && trade.is_intraday();
    if margin_settled {
        if let Some(net) = trade.net_pnl {
            if !net.is_zero() {
                state = state.apply_trade_pnl(net)?;
                rows.push(settlement_row(
                    pool_id,
                    &trade.id,
                    pnl_kind(net),
                    net.abs(),
                    format!("Intraday options P&L: {}", trade.symbol),
                    state.current_amount,
                    now,
                ));
            }
        }
    } else {
        state = state.apply_investment(trade.entry_value)?;
        rows.push(settlement_row(
            pool_id,
            &trade.id,
            TransactionKind::Withdrawal,
            trade.entry_value,
            format!("Trade investment: {}", trade.symbol),
            state.current_amount,
            now,
        ));

        if trade.is_closed() {
            state = state.apply_principal_return(trade.entry_value)?;
            rows.push(settlement_row(
                pool_id,
                &trade.id,
                TransactionKind::Deposit,
                trade.entry_value,
                format!("Principal return: {}", trade.symbol),
                state.current_amount,
                now,
            ));

            if let Some(net) = trade.net_pnl {
                if !net.is_zero() {
                    state = state.apply_trade_pnl(net)?;
                    rows.push(settlement_row(
                        pool_id,
                        &trade.id,
                        pnl_kind(net),
                        net.abs(),
                        format!("Trade P&L: {}", trade.symbol),
                        state.current_amount,
                        now,
                    ));
                }
            }
        }
    }

    if rows.is_empty() {
        return Ok(rows);
    }
    for row in &rows {
        insert_transaction_tx(tx, row).await?;
    }
    store_pool_state_tx(tx, pool_id, &state).await?;
    Ok(rows)
}

fn pnl_kind(net: Decimal) -> TransactionKind {
    if net.is_negative() {
        TransactionKind::Loss
    } else {
        TransactionKind::Profit
    }
}

fn settlement_row(
    pool_id: &str,
    trade_id: &str,
    kind: TransactionKind,
    amount: Decimal,
    description: String,
    balance_after: Decimal,
    now: TimeMs,
) -> CapitalTransaction {
    CapitalTransaction {
        id: Uuid::new_v4().to_string(),
        pool_id: pool_id.to_string(),
        kind,
        amount,
        description: Some(description),
        trade_id: Some(trade_id.to_string()),
        balance_after,
        reversed_by: None,
        reverses: None,
        created_at_ms: now,
    }
}

/// Append compensating rows for every live settlement row of a trade,
/// newest first, and mark the originals reversed.
async fn unwind_trade_tx(
    tx: &mut Transaction<'_, Sqlite>,
    trade_id: &str,
) -> Result<Vec<CapitalTransaction>, CapitalError> {
    let rows = sqlx::query(
        r#"
        SELECT id, pool_id, kind, amount, description, trade_id,
               balance_after, reversed_by, reverses, created_at_ms
        FROM capital_transactions
        WHERE trade_id = ? AND reversed_by IS NULL AND reverses IS NULL
        ORDER BY rowid DESC
        "#,
    )
    .bind(trade_id)
    .fetch_all(&mut **tx)
    .await?;

    let originals = rows
        .iter()
        .map(transaction_from_row)
        .collect::<Result<Vec<_>, sqlx::Error>>()?;
    if originals.is_empty() {
        return Ok(Vec::new());
    }

    // all settlement rows of a trade live in the trade's pool
    let pool_id = originals[0].pool_id.clone();
    let pool = fetch_pool_tx(tx, &pool_id).await?;
    let mut state = pool_state(&pool);
    let mut compensating = Vec::with_capacity(originals.len());
    let now = TimeMs::now();

    for original in &originals {
        state = state.reverse_trade_linked(original.kind, original.amount)?;
        let comp = CapitalTransaction {
            id: Uuid::new_v4().to_string(),
            pool_id: pool_id.clone(),
            kind: original.kind.inverse(),
            amount: original.amount,
            description: Some(format!("Reversal of {}", original.id)),
            trade_id: Some(trade_id.to_string()),
            balance_after: state.current_amount,
            reversed_by: None,
            reverses: Some(original.id.clone()),
            created_at_ms: now,
        };
        insert_transaction_tx(tx, &comp).await?;
        sqlx::query("UPDATE capital_transactions SET reversed_by = ? WHERE id = ?")
            .bind(&comp.id)
            .bind(&original.id)
            .execute(&mut **tx)
            .await?;
        compensating.push(comp);
    }

    store_pool_state_tx(tx, &pool_id, &state).await?;
    Ok(compensating)
}

// =========================================================================
// Tags
// =========================================================================

/// Resolve tag references inside the trade's transaction: ids must exist,
/// named tags are found or created, duplicates collapse.
async fn resolve_tags_tx(
    tx: &mut Transaction<'_, Sqlite>,
    trade_id: &str,
    refs: &[TagRef],
) -> Result<Vec<Tag>, CapitalError> {
    let mut tags: Vec<Tag> = Vec::new();

    for tag_ref in refs {
        let tag = match tag_ref {
            TagRef::Id(id) => {
                let row = sqlx::query("SELECT id, name, kind, created_at_ms FROM tags WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?;
                match row {
                    Some(r) => tag_from_row(&r)?,
                    None => return Err(CapitalError::TagNotFound(id.clone())),
                }
            }
            TagRef::Named { name, kind } => {
                let row = sqlx::query(
                    "SELECT id, name, kind, created_at_ms FROM tags WHERE name = ? AND kind = ?",
                )
                .bind(name)
                .bind(kind.as_str())
                .fetch_optional(&mut **tx)
                .await?;
                match row {
                    Some(r) => tag_from_row(&r)?,
                    None => {
                        let tag = Tag {
                            id: Uuid::new_v4().to_string(),
                            name: name.clone(),
                            kind: *kind,
                            created_at_ms: TimeMs::now(),
                        };
                        sqlx::query(
                            "INSERT INTO tags (id, name, kind, created_at_ms) VALUES (?, ?, ?, ?)",
                        )
                        .bind(&tag.id)
                        .bind(&tag.name)
                        .bind(tag.kind.as_str())
                        .bind(tag.created_at_ms.as_ms())
                        .execute(&mut **tx)
                        .await?;
                        tag
                    }
                }
            }
        };

        if tags.iter().any(|t| t.id == tag.id) {
            continue;
        }
        sqlx::query("INSERT OR IGNORE INTO trade_tags (trade_id, tag_id) VALUES (?, ?)")
            .bind(trade_id)
            .bind(&tag.id)
            .execute(&mut **tx)
            .await?;
        tags.push(tag);
    }

    Ok(tags)
}

// =========================================================================
// Row mapping
// =========================================================================

fn trade_from_row(row: &SqliteRow) -> Result<Trade, sqlx::Error> {
    let id: String = row.get("id");
    let instrument_str: String = row.get("instrument");
    let instrument = Instrument::parse(&instrument_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown instrument: {}", instrument_str).into())
    })?;
    let side_str: String = row.get("side");
    let side = TradeSide::parse(&side_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown side: {}", side_str).into()))?;

    let quantity: String = row.get("quantity");
    let entry_price: String = row.get("entry_price");
    let entry_value: String = row.get("entry_value");

    Ok(Trade {
        instrument,
        side,
        quantity: parse_decimal_col(&quantity, "quantity", &id),
        entry_price: parse_decimal_col(&entry_price, "entry_price", &id),
        exit_price: opt_decimal(row, "exit_price", &id),
        entry_time_ms: TimeMs::new(row.get("entry_time_ms")),
        exit_time_ms: row.get::<Option<i64>, _>("exit_time_ms").map(TimeMs::new),
        entry_value: parse_decimal_col(&entry_value, "entry_value", &id),
        exit_value: opt_decimal(row, "exit_value", &id),
        gross_pnl: opt_decimal(row, "gross_pnl", &id),
        net_pnl: opt_decimal(row, "net_pnl", &id),
        return_pct: opt_decimal(row, "return_pct", &id),
        symbol: row.get("symbol"),
        strategy: row.get("strategy"),
        notes: row.get("notes"),
        pool_id: row.get("pool_id"),
        fingerprint: row.get("fingerprint"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
        charges: TradeCharges::default(),
        option_details: None,
        hedge: None,
        tags: Vec::new(),
        id,
    })
}

fn opt_decimal(row: &SqliteRow, column: &str, row_id: &str) -> Option<Decimal> {
    row.get::<Option<String>, _>(column)
        .map(|v| parse_decimal_col(&v, column, row_id))
}

fn charges_from_row(row: &SqliteRow, trade_id: &str) -> TradeCharges {
    let brokerage: String = row.get("brokerage");
    let stt: String = row.get("stt");
    let exchange: String = row.get("exchange");
    let sebi: String = row.get("sebi");
    let stamp_duty: String = row.get("stamp_duty");
    let gst: String = row.get("gst");
    let total: String = row.get("total");

    TradeCharges {
        brokerage: parse_decimal_col(&brokerage, "brokerage", trade_id),
        stt: parse_decimal_col(&stt, "stt", trade_id),
        exchange: parse_decimal_col(&exchange, "exchange", trade_id),
        sebi: parse_decimal_col(&sebi, "sebi", trade_id),
        stamp_duty: parse_decimal_col(&stamp_duty, "stamp_duty", trade_id),
        gst: parse_decimal_col(&gst, "gst", trade_id),
        total: parse_decimal_col(&total, "total", trade_id),
    }
}

fn tag_from_row(row: &SqliteRow) -> Result<Tag, sqlx::Error> {
    let kind_str: String = row.get("kind");
    let kind = TagKind::parse(&kind_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown tag kind: {}", kind_str).into()))?;
    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        kind,
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
    })
}
