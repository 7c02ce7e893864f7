//! Pure computation engines for charges, P&L, and the capital ledger.

pub mod charges;
pub mod ledger;
pub mod pnl;

pub use charges::{BrokerageMode, ChargeSchedule, InstrumentRates};
pub use ledger::{LedgerError, PoolState};
pub use pnl::PnlBreakdown;
