//! Strategy Evaluator (component C, spec §4.C). Each strategy is a small
//! stateless rule set over the current `Indicators` snapshot; the
//! `Evaluator` walks a pair's configured strategies in order and returns
//! the first BUY candidate.

mod macd_supertrend;
mod mean_reversion;
mod momentum;
mod scalping;

pub mod evaluator;

use crate::domain::indicators::Indicators;
use crate::domain::position::Position;
use crate::domain::strategy::{StrategyKind, StrategySignal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub use evaluator::Evaluator;

/// Everything a strategy needs to evaluate one symbol on one tick. Borrows
/// rather than owns — strategies are pure, synchronous, and never outlive
/// the tick that constructs this.
pub struct StrategyContext<'a> {
    pub current_price: Decimal,
    pub indicators: &'a Indicators,
    pub position: Option<&'a Position>,
    pub min_hold_minutes: i64,
    pub now: DateTime<Utc>,
}

impl<'a> StrategyContext<'a> {
    fn profit_percent(&self) -> Decimal {
        self.position.map(|p| p.profit_percent(self.current_price)).unwrap_or_default()
    }

    fn hold_minutes(&self) -> i64 {
        self.position.map(|p| p.hold_minutes(self.now)).unwrap_or(0)
    }
}

/// A single strategy's rule set (spec §4.C). `evaluate_entry` only ever
/// returns BUY or HOLD — the evaluator never emits SELL for exits.
/// `evaluate_exit` is the strategy-owned secondary exit check the monitor
/// loop consults separately (momentum, mean_reversion only; others always
/// report no exit).
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn evaluate_entry(&self, ctx: &StrategyContext) -> StrategySignal;
    fn evaluate_exit(&self, _ctx: &StrategyContext) -> bool {
        false
    }
}

pub fn strategy_for(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Scalping => Box::new(scalping::Scalping),
        StrategyKind::Momentum => Box::new(momentum::Momentum),
        StrategyKind::MeanReversion => Box::new(mean_reversion::MeanReversion),
        StrategyKind::MacdSupertrend => Box::new(macd_supertrend::MacdSupertrend),
    }
}
