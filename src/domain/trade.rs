//! Trade record and its owned sub-records.

use crate::domain::{Decimal, Instrument, Tag, TimeMs, TradeSide};
use serde::{Deserialize, Serialize};

/// One logged trade with entry/exit prices, charges, and computed P&L.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Stable unique identifier (UUIDv4).
    pub id: String,
    /// Instrument symbol, stored uppercased.
    pub symbol: String,
    pub instrument: Instrument,
    pub side: TradeSide,
    /// Quantity traded, always > 0.
    pub quantity: Decimal,
    pub entry_price: Decimal,
    /// Exit price; presence defines closed vs open.
    pub exit_price: Option<Decimal>,
    pub entry_time_ms: TimeMs,
    pub exit_time_ms: Option<TimeMs>,
    /// quantity * entry_price.
    pub entry_value: Decimal,
    /// quantity * exit_price when closed.
    pub exit_value: Option<Decimal>,
    pub gross_pnl: Option<Decimal>,
    pub net_pnl: Option<Decimal>,
    pub return_pct: Option<Decimal>,
    pub strategy: Option<String>,
    pub notes: Option<String>,
    /// Capital pool this trade settles against, if any.
    pub pool_id: Option<String>,
    /// Duplicate-submission guard key over the identity fields.
    pub fingerprint: String,
    pub created_at_ms: TimeMs,
    pub charges: TradeCharges,
    pub option_details: Option<OptionDetails>,
    pub hedge: Option<HedgePosition>,
    pub tags: Vec<Tag>,
}

impl Trade {
    /// True when an exit price is recorded.
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some()
    }

    /// Entry value plus exit value (zero while open).
    pub fn turnover(&self) -> Decimal {
        self.entry_value + self.exit_value.unwrap_or_else(Decimal::zero)
    }

    /// Closed same UTC calendar day as entry.
    pub fn is_intraday(&self) -> bool {
        self.exit_time_ms
            .map(|exit| self.entry_time_ms.same_utc_day(exit))
            .unwrap_or(false)
    }

    /// Generate the duplicate-guard fingerprint for a trade's identity fields.
    ///
    /// Two submissions with the same symbol, side, instrument, quantity, and
    /// entry price hash to the same value.
    pub fn compute_fingerprint(
        symbol: &str,
        side: TradeSide,
        instrument: Instrument,
        quantity: &Decimal,
        entry_price: &Decimal,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(side.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(instrument.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(quantity.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(entry_price.to_canonical_string().as_bytes());

        hex::encode(hasher.finalize())
    }
}

/// Statutory and broker charges for one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCharges {
    pub brokerage: Decimal,
    pub stt: Decimal,
    pub exchange: Decimal,
    pub sebi: Decimal,
    pub stamp_duty: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
}

/// Option-specific fields, present only when instrument = OPTIONS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDetails {
    pub strike_price: Decimal,
    pub expiry_ms: TimeMs,
    pub lot_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying: Option<String>,
}

/// Inverse-side shadow position attached to a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgePosition {
    pub quantity: Decimal,
    pub entry_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
}
