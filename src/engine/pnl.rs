//! P&L calculator: pure derivation of gross/net P&L and percentage return.

use crate::domain::{Decimal, TradeSide};

/// Derived P&L figures for a trade. All None while the trade is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PnlBreakdown {
    pub gross_pnl: Option<Decimal>,
    pub net_pnl: Option<Decimal>,
    pub return_pct: Option<Decimal>,
}

/// quantity * entry_price.
pub fn entry_value(quantity: Decimal, entry_price: Decimal) -> Decimal {
    quantity * entry_price
}

/// quantity * exit_price when closed.
pub fn exit_value(quantity: Decimal, exit_price: Option<Decimal>) -> Option<Decimal> {
    exit_price.map(|px| quantity * px)
}

/// Compute gross P&L, net P&L, and percentage return.
///
/// Gross follows the position sign convention: a BUY profits when exit
/// exceeds entry, a SELL when entry exceeds exit. Net subtracts total
/// charges. Percentage return is net over entry value; a zero entry value
/// yields None rather than dividing.
pub fn compute_pnl(
    side: TradeSide,
    entry_value: Decimal,
    exit_value: Option<Decimal>,
    charges_total: Decimal,
) -> PnlBreakdown {
    let exit = match exit_value {
        Some(v) => v,
        None => return PnlBreakdown::default(),
    };

    let gross = match side {
        TradeSide::Buy => exit - entry_value,
        TradeSide::Sell => entry_value - exit,
    };
    let net = gross - charges_total;

    let return_pct = if entry_value.is_zero() {
        None
    } else {
        Some(net / entry_value * Decimal::hundred())
    };

    PnlBreakdown {
        gross_pnl: Some(gross),
        net_pnl: Some(net),
        return_pct,
    }
}
