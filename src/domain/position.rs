//! The central stateful entity (spec §3). A `Position` is created exactly
//! once by a successful buy and destroyed by exactly one terminal exit.

use crate::domain::strategy::StrategyKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Legacy defaults applied when a loaded record predates AI-parameter
/// tracking (spec §3: "If absent (legacy), defaults apply").
pub const DEFAULT_STOP_LOSS_PERCENT: Decimal = dec!(2.0);
pub const DEFAULT_TAKE_PROFIT_PERCENT: Decimal = dec!(4.0);
pub const DEFAULT_POSITION_SIZE_PERCENT: Decimal = dec!(10.0);
pub const DEFAULT_RISK_REWARD_RATIO: Decimal = dec!(2.0);

pub const STOP_LOSS_PERCENT_RANGE: (Decimal, Decimal) = (dec!(0.5), dec!(5.0));
pub const TAKE_PROFIT_PERCENT_RANGE: (Decimal, Decimal) = (dec!(1.0), dec!(15.0));
pub const POSITION_SIZE_PERCENT_RANGE: (Decimal, Decimal) = (dec!(1.0), dec!(20.0));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub strategy: StrategyKind,
    pub trade_id: Uuid,
    pub ai_position_size_percent: Decimal,
    pub ai_stop_loss_percent: Decimal,
    pub ai_take_profit_percent: Decimal,
    pub ai_risk_reward_ratio: Decimal,
    pub highest_price_seen: Decimal,
    pub trailing_stop_armed: bool,
    pub status: PositionStatus,
    /// Set when the five-attempt exit retry schedule (§4.E) is exhausted
    /// without a fill. Surfaced to the control plane per §7.
    pub closing_retry_exhausted: bool,
}

impl Position {
    pub fn new(
        symbol: String,
        quantity: Decimal,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
        strategy: StrategyKind,
        ai_position_size_percent: Decimal,
        ai_stop_loss_percent: Decimal,
        ai_take_profit_percent: Decimal,
        ai_risk_reward_ratio: Decimal,
    ) -> Self {
        Self {
            symbol,
            quantity,
            entry_price,
            entry_time,
            strategy,
            trade_id: Uuid::new_v4(),
            ai_position_size_percent,
            ai_stop_loss_percent,
            ai_take_profit_percent,
            ai_risk_reward_ratio,
            highest_price_seen: entry_price,
            trailing_stop_armed: false,
            status: PositionStatus::Open,
            closing_retry_exhausted: false,
        }
    }

    pub fn notional(&self, current_price: Decimal) -> Decimal {
        self.quantity * current_price
    }

    pub fn is_dust(&self, current_price: Decimal, min_order_value_usd: Decimal) -> bool {
        self.notional(current_price) < min_order_value_usd
    }

    /// `(current_price - entry_price) / entry_price * 100`.
    pub fn profit_percent(&self, current_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (current_price - self.entry_price) / self.entry_price * dec!(100)
    }

    /// Clamps a candidate highest-price observation; never decreases
    /// (spec §3 invariant: `highest_price_seen` monotonically
    /// non-decreasing while open).
    pub fn observe_price(&mut self, current_price: Decimal) {
        if current_price > self.highest_price_seen {
            self.highest_price_seen = current_price;
        }
    }

    pub fn hold_minutes(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.entry_time).num_minutes()
    }
}

/// Clamps an AI-proposed parameter into the range required by §3's Position
/// invariants, used both when constructing a new position and when loading
/// one from disk.
pub fn clamp_stop_loss_percent(v: Decimal) -> Decimal {
    v.clamp(STOP_LOSS_PERCENT_RANGE.0, STOP_LOSS_PERCENT_RANGE.1)
}

pub fn clamp_take_profit_percent(v: Decimal) -> Decimal {
    v.clamp(TAKE_PROFIT_PERCENT_RANGE.0, TAKE_PROFIT_PERCENT_RANGE.1)
}

pub fn clamp_position_size_percent(v: Decimal) -> Decimal {
    v.clamp(POSITION_SIZE_PERCENT_RANGE.0, POSITION_SIZE_PERCENT_RANGE.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_position() -> Position {
        Position::new(
            "BTCUSD".to_string(),
            dec!(0.01),
            dec!(100),
            Utc::now(),
            StrategyKind::Momentum,
            dec!(10),
            dec!(2),
            dec!(4),
            dec!(2),
        )
    }

    #[test]
    fn highest_price_seen_never_decreases() {
        let mut pos = new_position();
        pos.observe_price(dec!(110));
        pos.observe_price(dec!(105));
        assert_eq!(pos.highest_price_seen, dec!(110));
    }

    #[test]
    fn profit_percent_is_zero_at_entry() {
        let pos = new_position();
        assert_eq!(pos.profit_percent(dec!(100)), dec!(0));
    }

    #[test]
    fn dust_when_notional_below_floor() {
        let pos = new_position();
        assert!(pos.is_dust(dec!(0.0000001), dec!(1.00)));
    }

    #[test]
    fn clamps_stop_loss_outside_range() {
        assert_eq!(clamp_stop_loss_percent(dec!(10)), dec!(5));
        assert_eq!(clamp_stop_loss_percent(dec!(0.1)), dec!(0.5));
    }
}
