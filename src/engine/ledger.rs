//! Pure pool-state transitions for the capital ledger.
//!
//! Each transition consumes a `PoolState` and returns the next state or an
//! `InsufficientBalance` error. Persistence wraps these in a database
//! transaction; nothing here touches I/O. Every transition that subtracts
//! from the balance refuses to take it below zero.

use crate::domain::{Decimal, TransactionKind};
use thiserror::Error;

/// The mutable slice of a capital pool the ledger operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolState {
    pub current_amount: Decimal,
    pub total_invested: Decimal,
    pub total_withdrawn: Decimal,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },
}

impl PoolState {
    fn debit(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        if self.current_amount < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: self.current_amount,
            });
        }
        Ok(self.current_amount - amount)
    }

    /// Apply a standalone (externally requested) transaction.
    pub fn apply_external(
        self,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<PoolState, LedgerError> {
        let next = match kind {
            TransactionKind::Deposit | TransactionKind::TransferIn => PoolState {
                current_amount: self.current_amount + amount,
                ..self
            },
            TransactionKind::Withdrawal => PoolState {
                current_amount: self.debit(amount)?,
                total_withdrawn: self.total_withdrawn + amount,
                ..self
            },
            TransactionKind::TransferOut => PoolState {
                current_amount: self.debit(amount)?,
                ..self
            },
            TransactionKind::Profit => PoolState {
                current_amount: self.current_amount + amount,
                total_pnl: self.total_pnl + amount,
                ..self
            },
            TransactionKind::Loss => PoolState {
                current_amount: self.debit(amount)?,
                total_pnl: self.total_pnl - amount,
                ..self
            },
        };
        Ok(next)
    }

    /// Withdraw a trade's entry value as an investment.
    pub fn apply_investment(self, amount: Decimal) -> Result<PoolState, LedgerError> {
        Ok(PoolState {
            current_amount: self.debit(amount)?,
            total_invested: self.total_invested + amount,
            ..self
        })
    }

    /// Return the invested principal when a trade closes.
    pub fn apply_principal_return(self, amount: Decimal) -> Result<PoolState, LedgerError> {
        Ok(PoolState {
            current_amount: self.current_amount + amount,
            total_invested: self.total_invested - amount,
            ..self
        })
    }

    /// Apply a closed trade's net P&L, signed.
    pub fn apply_trade_pnl(self, net_pnl: Decimal) -> Result<PoolState, LedgerError> {
        let current_amount = if net_pnl.is_negative() {
            self.debit(net_pnl.abs())?
        } else {
            self.current_amount + net_pnl
        };
        Ok(PoolState {
            current_amount,
            total_pnl: self.total_pnl + net_pnl,
            ..self
        })
    }

    /// Undo the effect of an external transaction of `original_kind`.
    pub fn reverse_external(
        self,
        original_kind: TransactionKind,
        amount: Decimal,
    ) -> Result<PoolState, LedgerError> {
        let next = match original_kind {
            TransactionKind::Deposit | TransactionKind::TransferIn => PoolState {
                current_amount: self.debit(amount)?,
                ..self
            },
            TransactionKind::Withdrawal => PoolState {
                current_amount: self.current_amount + amount,
                total_withdrawn: self.total_withdrawn - amount,
                ..self
            },
            TransactionKind::TransferOut => PoolState {
                current_amount: self.current_amount + amount,
                ..self
            },
            TransactionKind::Profit => PoolState {
                current_amount: self.debit(amount)?,
                total_pnl: self.total_pnl - amount,
                ..self
            },
            TransactionKind::Loss => PoolState {
                current_amount: self.current_amount + amount,
                total_pnl: self.total_pnl + amount,
                ..self
            },
        };
        Ok(next)
    }

    /// Undo the effect of a trade-settlement row of `original_kind`.
    ///
    /// Settlement rows share kinds with external rows but move different
    /// totals: a settlement WITHDRAWAL moved `total_invested`, not
    /// `total_withdrawn`, and its DEPOSIT counterpart moved it back.
    pub fn reverse_trade_linked(
        self,
        original_kind: TransactionKind,
        amount: Decimal,
    ) -> Result<PoolState, LedgerError> {
        match original_kind {
            TransactionKind::Withdrawal => self.apply_principal_return(amount),
            TransactionKind::Deposit => self.apply_investment(amount),
            TransactionKind::Profit => Ok(PoolState {
                current_amount: self.debit(amount)?,
                total_pnl: self.total_pnl - amount,
                ..self
            }),
            TransactionKind::Loss => Ok(PoolState {
                current_amount: self.current_amount + amount,
                total_pnl: self.total_pnl + amount,
                ..self
            }),
            // Settlement never writes transfers; treat as external just in case
            other => self.reverse_external(other, amount),
        }
    }
}
