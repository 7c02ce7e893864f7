//! Strategy predictions, a simple journal entity alongside the ledger.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Bearish => "BEARISH",
            Direction::Neutral => "NEUTRAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BULLISH" => Some(Direction::Bullish),
            "BEARISH" => Some(Direction::Bearish),
            "NEUTRAL" => Some(Direction::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionStatus {
    Pending,
    Passed,
    Failed,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Pending => "PENDING",
            PredictionStatus::Passed => "PASSED",
            PredictionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PredictionStatus::Pending),
            "PASSED" => Some(PredictionStatus::Passed),
            "FAILED" => Some(PredictionStatus::Failed),
            _ => None,
        }
    }
}

/// A recorded market call for a strategy, resolved later as passed or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub strategy: String,
    pub direction: Direction,
    /// Conviction on a 1-10 scale.
    pub confidence: i64,
    pub status: PredictionStatus,
    pub result: Option<String>,
    pub notes: Option<String>,
    pub created_at_ms: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_roundtrip() {
        for d in [Direction::Bullish, Direction::Bearish, Direction::Neutral] {
            assert_eq!(Direction::parse(d.as_str()), Some(d));
        }
        assert_eq!(Direction::parse("bullish"), None);
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for s in [
            PredictionStatus::Pending,
            PredictionStatus::Passed,
            PredictionStatus::Failed,
        ] {
            assert_eq!(PredictionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(PredictionStatus::parse("done"), None);
    }
}
