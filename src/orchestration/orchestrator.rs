use crate::config::Config;
use crate::db::{CapitalError, Repository};
use crate::domain::{
    CapitalTransaction, Decimal, HedgePosition, Instrument, OptionDetails, TagKind, TagRef,
    TimeMs, Trade, TradeCharges, TradeSide,
};
use crate::engine::{pnl, ChargeSchedule};
use crate::error::ValidationIssue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Coordinates trade recording: validation, the duplicate guard, charge and
/// P&L derivation, and the atomic persist-plus-settle step.
#[derive(Clone)]
pub struct Orchestrator {
    repo: Arc<Repository>,
    schedule: ChargeSchedule,
    trust_client_charges: bool,
    duplicate_window_ms: i64,
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),
    #[error("duplicate of trade {0}")]
    Duplicate(String),
    #[error(transparent)]
    Capital(#[from] CapitalError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Outcome of recording a trade: the stored trade with its tags resolved,
/// and the ledger rows its settlement wrote.
#[derive(Debug)]
pub struct RecordedTrade {
    pub trade: Trade,
    pub settlements: Vec<CapitalTransaction>,
}

// =========================================================================
// Wire drafts
// =========================================================================

/// Incoming trade payload. Everything is optional at the serde layer so the
/// validator can report all problems in one pass.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeDraft {
    pub symbol: Option<String>,
    pub instrument_type: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub entry_time_ms: Option<i64>,
    pub exit_time_ms: Option<i64>,
    pub strategy: Option<String>,
    pub notes: Option<String>,
    pub pool_id: Option<String>,
    pub charges: Option<ChargesDraft>,
    pub option_details: Option<OptionDraft>,
    pub hedge: Option<HedgeDraft>,
    pub tags: Option<Vec<TagDraft>>,
}

/// Client-supplied charge components. Missing components count as zero;
/// the total is always recomputed as the component sum.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargesDraft {
    pub brokerage: Option<Decimal>,
    pub stt: Option<Decimal>,
    pub exchange: Option<Decimal>,
    pub sebi: Option<Decimal>,
    pub stamp_duty: Option<Decimal>,
    pub gst: Option<Decimal>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionDraft {
    pub strike_price: Option<Decimal>,
    pub expiry_ms: Option<i64>,
    pub lot_size: Option<i64>,
    pub underlying: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HedgeDraft {
    pub quantity: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
}

/// A tag reference: either an existing id, or a name plus kind to
/// find-or-create.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagDraft {
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug)]
struct ValidDraft {
    symbol: String,
    instrument: Instrument,
    side: TradeSide,
    quantity: Decimal,
    entry_price: Decimal,
    exit_price: Option<Decimal>,
    entry_time_ms: TimeMs,
    exit_time_ms: Option<TimeMs>,
    option_details: Option<OptionDetails>,
    hedge: Option<HedgePosition>,
    tag_refs: Vec<TagRef>,
}

impl Orchestrator {
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        Self {
            repo,
            schedule: ChargeSchedule::standard(),
            trust_client_charges: config.trust_client_charges,
            duplicate_window_ms: config.duplicate_window_ms,
        }
    }

    /// Validate, derive, and persist one trade.
    ///
    /// Runs the duplicate guard before writing: a trade with the same
    /// identity fields recorded within the configured window is rejected
    /// with the existing trade's id.
    pub async fn record_trade(
        &self,
        draft: TradeDraft,
    ) -> Result<RecordedTrade, OrchestrationError> {
        let valid = validate_draft(&draft).map_err(OrchestrationError::Validation)?;

        let entry_value = pnl::entry_value(valid.quantity, valid.entry_price);
        let exit_value = pnl::exit_value(valid.quantity, valid.exit_price);
        let fingerprint = Trade::compute_fingerprint(
            &valid.symbol,
            valid.side,
            valid.instrument,
            &valid.quantity,
            &valid.entry_price,
        );

        if self.duplicate_window_ms > 0 {
            let since = TimeMs::now().as_ms() - self.duplicate_window_ms;
            if let Some(existing) = self
                .repo
                .find_recent_by_fingerprint(&fingerprint, since)
                .await?
            {
                return Err(OrchestrationError::Duplicate(existing));
            }
        }

        let charges = match &draft.charges {
            Some(client) if self.trust_client_charges => client_charges(client),
            _ => self
                .schedule
                .compute(valid.instrument, valid.side, entry_value, exit_value),
        };
        let pnl = pnl::compute_pnl(valid.side, entry_value, exit_value, charges.total);

        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            symbol: valid.symbol,
            instrument: valid.instrument,
            side: valid.side,
            quantity: valid.quantity,
            entry_price: valid.entry_price,
            exit_price: valid.exit_price,
            entry_time_ms: valid.entry_time_ms,
            exit_time_ms: valid.exit_time_ms,
            entry_value,
            exit_value,
            gross_pnl: pnl.gross_pnl,
            net_pnl: pnl.net_pnl,
            return_pct: pnl.return_pct,
            strategy: draft.strategy.clone(),
            notes: draft.notes.clone(),
            pool_id: draft.pool_id.clone(),
            fingerprint,
            created_at_ms: TimeMs::now(),
            charges,
            option_details: valid.option_details,
            hedge: valid.hedge,
            tags: Vec::new(),
        };

        let (tags, settlements) = self
            .repo
            .insert_trade_atomic(&trade, &valid.tag_refs)
            .await?;

        tracing::info!(
            trade_id = %trade.id,
            symbol = %trade.symbol,
            ledger_rows = settlements.len(),
            "Recorded trade"
        );

        let mut trade = trade;
        trade.tags = tags;
        Ok(RecordedTrade { trade, settlements })
    }
}

fn client_charges(draft: &ChargesDraft) -> TradeCharges {
    let brokerage = draft.brokerage.unwrap_or_else(Decimal::zero);
    let stt = draft.stt.unwrap_or_else(Decimal::zero);
    let exchange = draft.exchange.unwrap_or_else(Decimal::zero);
    let sebi = draft.sebi.unwrap_or_else(Decimal::zero);
    let stamp_duty = draft.stamp_duty.unwrap_or_else(Decimal::zero);
    let gst = draft.gst.unwrap_or_else(Decimal::zero);
    let total = brokerage + stt + exchange + sebi + stamp_duty + gst;
    TradeCharges {
        brokerage,
        stt,
        exchange,
        sebi,
        stamp_duty,
        gst,
        total,
    }
}

// =========================================================================
// Validation
// =========================================================================

/// Check the whole draft and report every problem at once.
fn validate_draft(draft: &TradeDraft) -> Result<ValidDraft, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let symbol = match draft.symbol.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(s.to_uppercase()),
        Some(_) => {
            issues.push(ValidationIssue::new("symbol", "must not be empty"));
            None
        }
        None => {
            issues.push(ValidationIssue::new("symbol", "is required"));
            None
        }
    };

    let instrument = match draft.instrument_type.as_deref() {
        Some(s) => match Instrument::parse(s) {
            Some(i) => Some(i),
            None => {
                issues.push(ValidationIssue::new(
                    "instrumentType",
                    "must be one of EQUITY, FUTURES, OPTIONS",
                ));
                None
            }
        },
        None => {
            issues.push(ValidationIssue::new("instrumentType", "is required"));
            None
        }
    };

    let side = match draft.side.as_deref() {
        Some(s) => match TradeSide::parse(s) {
            Some(side) => Some(side),
            None => {
                issues.push(ValidationIssue::new("side", "must be BUY or SELL"));
                None
            }
        },
        None => {
            issues.push(ValidationIssue::new("side", "is required"));
            None
        }
    };

    let quantity = match draft.quantity {
        Some(q) if q.is_positive() => Some(q),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "quantity",
                "must be greater than zero",
            ));
            None
        }
        None => {
            issues.push(ValidationIssue::new("quantity", "is required"));
            None
        }
    };

    let entry_price = match draft.entry_price {
        Some(px) if px.is_positive() => Some(px),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "entryPrice",
                "must be greater than zero",
            ));
            None
        }
        None => {
            issues.push(ValidationIssue::new("entryPrice", "is required"));
            None
        }
    };

    let exit_price = match draft.exit_price {
        Some(px) if px.is_positive() => Some(px),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "exitPrice",
                "must be greater than zero",
            ));
            None
        }
        None => None,
    };

    let entry_time_ms = match draft.entry_time_ms {
        Some(ms) if ms > 0 => Some(TimeMs::new(ms)),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "entryTimeMs",
                "must be a positive epoch-millisecond timestamp",
            ));
            None
        }
        None => {
            issues.push(ValidationIssue::new("entryTimeMs", "is required"));
            None
        }
    };

    // exit price and exit time come as a pair
    if draft.exit_price.is_some() && draft.exit_time_ms.is_none() {
        issues.push(ValidationIssue::new(
            "exitTimeMs",
            "is required when exitPrice is set",
        ));
    }
    if draft.exit_time_ms.is_some() && draft.exit_price.is_none() {
        issues.push(ValidationIssue::new(
            "exitPrice",
            "is required when exitTimeMs is set",
        ));
    }
    let exit_time_ms = draft.exit_time_ms.map(TimeMs::new);
    if let (Some(entry), Some(exit)) = (entry_time_ms, exit_time_ms) {
        if exit.as_ms() < entry.as_ms() {
            issues.push(ValidationIssue::new(
                "exitTimeMs",
                "must not precede entryTimeMs",
            ));
        }
    }

    let option_details = validate_option_draft(draft, instrument, &mut issues);
    let hedge = validate_hedge_draft(draft, &mut issues);
    validate_charges_draft(draft, &mut issues);
    let tag_refs = validate_tag_drafts(draft, &mut issues);

    if !issues.is_empty() {
        return Err(issues);
    }

    match (
        symbol,
        instrument,
        side,
        quantity,
        entry_price,
        entry_time_ms,
    ) {
        (
            Some(symbol),
            Some(instrument),
            Some(side),
            Some(quantity),
            Some(entry_price),
            Some(entry_time_ms),
        ) => Ok(ValidDraft {
            symbol,
            instrument,
            side,
            quantity,
            entry_price,
            exit_price,
            entry_time_ms,
            exit_time_ms,
            option_details,
            hedge,
            tag_refs,
        }),
        _ => Err(vec![ValidationIssue::new("payload", "is incomplete")]),
    }
}

fn validate_option_draft(
    draft: &TradeDraft,
    instrument: Option<Instrument>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<OptionDetails> {
    let option = draft.option_details.as_ref()?;

    if instrument.is_some() && instrument != Some(Instrument::Options) {
        issues.push(ValidationIssue::new(
            "optionDetails",
            "is only valid for OPTIONS trades",
        ));
        return None;
    }

    let mut ok = true;
    let strike_price = match option.strike_price {
        Some(px) if px.is_positive() => px,
        _ => {
            issues.push(ValidationIssue::new(
                "optionDetails.strikePrice",
                "must be greater than zero",
            ));
            ok = false;
            Decimal::zero()
        }
    };
    let expiry_ms = match option.expiry_ms {
        Some(ms) if ms > 0 => TimeMs::new(ms),
        _ => {
            issues.push(ValidationIssue::new(
                "optionDetails.expiryMs",
                "must be a positive epoch-millisecond timestamp",
            ));
            ok = false;
            TimeMs::new(0)
        }
    };
    let lot_size = match option.lot_size {
        Some(n) if n > 0 => n,
        _ => {
            issues.push(ValidationIssue::new(
                "optionDetails.lotSize",
                "must be greater than zero",
            ));
            ok = false;
            0
        }
    };

    if !ok {
        return None;
    }
    Some(OptionDetails {
        strike_price,
        expiry_ms,
        lot_size,
        underlying: option.underlying.clone(),
    })
}

fn validate_hedge_draft(
    draft: &TradeDraft,
    issues: &mut Vec<ValidationIssue>,
) -> Option<HedgePosition> {
    let hedge = draft.hedge.as_ref()?;

    let mut ok = true;
    let quantity = match hedge.quantity {
        Some(q) if q.is_positive() => q,
        _ => {
            issues.push(ValidationIssue::new(
                "hedge.quantity",
                "must be greater than zero",
            ));
            ok = false;
            Decimal::zero()
        }
    };
    let entry_price = match hedge.entry_price {
        Some(px) if px.is_positive() => px,
        _ => {
            issues.push(ValidationIssue::new(
                "hedge.entryPrice",
                "must be greater than zero",
            ));
            ok = false;
            Decimal::zero()
        }
    };
    let exit_price = match hedge.exit_price {
        Some(px) if px.is_positive() => Some(px),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "hedge.exitPrice",
                "must be greater than zero",
            ));
            ok = false;
            None
        }
        None => None,
    };

    if !ok {
        return None;
    }
    Some(HedgePosition {
        quantity,
        entry_price,
        exit_price,
    })
}

fn validate_charges_draft(draft: &TradeDraft, issues: &mut Vec<ValidationIssue>) {
    let charges = match &draft.charges {
        Some(c) => c,
        None => return,
    };
    let components = [
        ("charges.brokerage", charges.brokerage),
        ("charges.stt", charges.stt),
        ("charges.exchange", charges.exchange),
        ("charges.sebi", charges.sebi),
        ("charges.stampDuty", charges.stamp_duty),
        ("charges.gst", charges.gst),
    ];
    for (field, value) in components {
        if let Some(v) = value {
            if v.is_negative() {
                issues.push(ValidationIssue::new(field, "must not be negative"));
            }
        }
    }
}

fn validate_tag_drafts(draft: &TradeDraft, issues: &mut Vec<ValidationIssue>) -> Vec<TagRef> {
    let drafts = match &draft.tags {
        Some(t) => t,
        None => return Vec::new(),
    };

    let mut refs = Vec::with_capacity(drafts.len());
    for (i, tag) in drafts.iter().enumerate() {
        if let Some(id) = tag.id.as_deref().map(str::trim) {
            if id.is_empty() {
                issues.push(ValidationIssue::new(
                    &format!("tags[{}].id", i),
                    "must not be empty",
                ));
            } else {
                refs.push(TagRef::Id(id.to_string()));
            }
            continue;
        }

        let name = tag.name.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() {
            issues.push(ValidationIssue::new(
                &format!("tags[{}]", i),
                "needs an id, or a name and kind",
            ));
            continue;
        }
        match tag.kind.as_deref().and_then(TagKind::parse) {
            Some(kind) => refs.push(TagRef::Named {
                name: name.to_string(),
                kind,
            }),
            None => issues.push(ValidationIssue::new(
                &format!("tags[{}].kind", i),
                "must be one of STRATEGY, EMOTIONAL, MARKET",
            )),
        }
    }
    refs
}
