//! Charge schedule: pure computation of broker and statutory charges.
//!
//! Rates follow the NSE discount-broker model. STT applies to the sell leg
//! only, stamp duty to the buy leg only, exchange and SEBI fees to total
//! turnover, and GST to brokerage plus exchange. Which price leg is the buy
//! or sell leg depends on the position side: a BUY position buys at entry and
//! sells at exit, a SELL position the reverse.

use crate::domain::{Decimal, Instrument, TradeCharges, TradeSide};

/// How brokerage is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerageMode {
    /// Flat fee per executed leg. A leg with zero value is not billed.
    FlatPerLeg(Decimal),
    /// Rate applied to total turnover.
    PercentOfTurnover(Decimal),
}

/// Per-instrument statutory rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentRates {
    /// Securities transaction tax, on the sell leg.
    pub stt: Decimal,
    /// Exchange transaction charge, on turnover.
    pub exchange: Decimal,
    /// Stamp duty, on the buy leg.
    pub stamp: Decimal,
}

/// Full charge schedule across instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeSchedule {
    pub brokerage: BrokerageMode,
    /// SEBI turnover fee rate, instrument-independent.
    pub sebi: Decimal,
    /// GST rate on brokerage + exchange.
    pub gst: Decimal,
    pub equity: InstrumentRates,
    pub futures: InstrumentRates,
    pub options: InstrumentRates,
}

impl ChargeSchedule {
    /// The standard NSE discount-broker schedule: flat Rs 20 per leg.
    pub fn standard() -> Self {
        ChargeSchedule {
            brokerage: BrokerageMode::FlatPerLeg(Decimal::from_parts(20, 0)),
            sebi: Decimal::from_parts(1, 6),
            gst: Decimal::from_parts(18, 2),
            equity: InstrumentRates {
                stt: Decimal::from_parts(1, 3),
                exchange: Decimal::from_parts(297, 7),
                stamp: Decimal::from_parts(15, 5),
            },
            futures: InstrumentRates {
                stt: Decimal::from_parts(2, 4),
                exchange: Decimal::from_parts(173, 7),
                stamp: Decimal::from_parts(2, 5),
            },
            options: InstrumentRates {
                stt: Decimal::from_parts(1, 3),
                exchange: Decimal::from_parts(3503, 7),
                stamp: Decimal::from_parts(3, 5),
            },
        }
    }

    fn rates(&self, instrument: Instrument) -> &InstrumentRates {
        match instrument {
            Instrument::Equity => &self.equity,
            Instrument::Futures => &self.futures,
            Instrument::Options => &self.options,
        }
    }

    /// Compute the charge breakdown for one trade.
    ///
    /// `exit_value` is None (treated as zero) while the trade is open; a zero
    /// leg contributes nothing to that leg's charges. Every component is
    /// rounded to two decimal places and `total` is the sum of the rounded
    /// components.
    pub fn compute(
        &self,
        instrument: Instrument,
        side: TradeSide,
        entry_value: Decimal,
        exit_value: Option<Decimal>,
    ) -> TradeCharges {
        let exit = exit_value.unwrap_or_else(Decimal::zero);
        let turnover = entry_value + exit;

        let (buy_leg, sell_leg) = match side {
            TradeSide::Buy => (entry_value, exit),
            TradeSide::Sell => (exit, entry_value),
        };

        let rates = self.rates(instrument);

        let brokerage = match self.brokerage {
            BrokerageMode::FlatPerLeg(fee) => {
                let mut b = Decimal::zero();
                if entry_value.is_positive() {
                    b = b + fee;
                }
                if exit.is_positive() {
                    b = b + fee;
                }
                b
            }
            BrokerageMode::PercentOfTurnover(rate) => rate * turnover,
        }
        .round2();

        let stt = (rates.stt * sell_leg).round2();
        let exchange = (rates.exchange * turnover).round2();
        let sebi = (self.sebi * turnover).round2();
        let stamp_duty = (rates.stamp * buy_leg).round2();
        let gst = (self.gst * (brokerage + exchange)).round2();

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
}
