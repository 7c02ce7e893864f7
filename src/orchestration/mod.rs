//! Trade recording pipeline: draft validation, duplicate detection, charge
//! and P&L derivation, atomic persistence with capital settlement.

pub mod orchestrator;

pub use orchestrator::{
    ChargesDraft, HedgeDraft, OptionDraft, OrchestrationError, Orchestrator, RecordedTrade,
    TagDraft, TradeDraft,
};
