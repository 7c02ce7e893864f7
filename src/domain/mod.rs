//! Domain types for the trading journal.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Instrument, TradeSide
//! - Trade, capital pool, and ledger transaction records
//! - Journal entities: tags, predictions, import jobs

pub mod decimal;
pub mod import;
pub mod pool;
pub mod prediction;
pub mod primitives;
pub mod tag;
pub mod trade;

pub use decimal::Decimal;
pub use import::{ImportJob, ImportStatus};
pub use pool::{CapitalPool, CapitalTransaction, TransactionKind};
pub use prediction::{Direction, Prediction, PredictionStatus};
pub use primitives::{Instrument, TimeMs, TradeSide};
pub use tag::{Tag, TagKind, TagRef};
pub use trade::{HedgePosition, OptionDetails, Trade, TradeCharges};
