//! Capital pool and its append-only transaction ledger.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// A capital allocation bucket with a live balance.
///
/// `current_amount` is maintained exclusively through the transactional
/// ledger path; no other code computes it independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalPool {
    pub id: String,
    pub name: String,
    pub initial_amount: Decimal,
    pub current_amount: Decimal,
    pub total_invested: Decimal,
    pub total_withdrawn: Decimal,
    pub total_pnl: Decimal,
    pub is_active: bool,
    pub created_at_ms: TimeMs,
}

/// Kind of a capital transaction. Stored and serialized uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Profit,
    Loss,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Profit => "PROFIT",
            TransactionKind::Loss => "LOSS",
            TransactionKind::TransferIn => "TRANSFER_IN",
            TransactionKind::TransferOut => "TRANSFER_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "WITHDRAWAL" => Some(TransactionKind::Withdrawal),
            "PROFIT" => Some(TransactionKind::Profit),
            "LOSS" => Some(TransactionKind::Loss),
            "TRANSFER_IN" => Some(TransactionKind::TransferIn),
            "TRANSFER_OUT" => Some(TransactionKind::TransferOut),
            _ => None,
        }
    }

    /// The kind a compensating transaction carries when this one is reversed.
    pub fn inverse(&self) -> Self {
        match self {
            TransactionKind::Deposit => TransactionKind::Withdrawal,
            TransactionKind::Withdrawal => TransactionKind::Deposit,
            TransactionKind::Profit => TransactionKind::Loss,
            TransactionKind::Loss => TransactionKind::Profit,
            TransactionKind::TransferIn => TransactionKind::TransferOut,
            TransactionKind::TransferOut => TransactionKind::TransferIn,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable row in a pool's ledger.
///
/// `balance_after` snapshots the pool balance at the moment this row
/// committed. Rows are never rewritten; "deleting" one appends a compensating
/// row and records the pairing via `reversed_by` / `reverses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalTransaction {
    pub id: String,
    pub pool_id: String,
    pub kind: TransactionKind,
    /// Positive magnitude; direction comes from `kind`.
    pub amount: Decimal,
    pub description: Option<String>,
    /// Trade that caused this row, for settlement entries.
    pub trade_id: Option<String>,
    pub balance_after: Decimal,
    /// Id of the compensating row that reversed this one.
    pub reversed_by: Option<String>,
    /// Id of the row this one compensates.
    pub reverses: Option<String>,
    pub created_at_ms: TimeMs,
}
