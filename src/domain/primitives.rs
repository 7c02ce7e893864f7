//! Domain primitives: TimeMs, Instrument, TradeSide.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// The UTC calendar date this instant falls on, if representable.
    pub fn utc_date(&self) -> Option<chrono::NaiveDate> {
        chrono::DateTime::from_timestamp_millis(self.0).map(|dt| dt.date_naive())
    }

    /// True when both instants fall on the same UTC calendar day.
    ///
    /// Drives the intraday-options settlement rule.
    pub fn same_utc_day(&self, other: TimeMs) -> bool {
        match (self.utc_date(), other.utc_date()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Instrument class of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instrument {
    Equity,
    Futures,
    Options,
}

impl Instrument {
    /// Stable uppercase name, also the stored form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Equity => "EQUITY",
            Instrument::Futures => "FUTURES",
            Instrument::Options => "OPTIONS",
        }
    }

    /// Parse the stored/wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EQUITY" => Some(Instrument::Equity),
            "FUTURES" => Some(Instrument::Futures),
            "OPTIONS" => Some(Instrument::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position side: Buy (long) or Sell (short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(TradeSide::Buy),
            "SELL" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
