//! Strategy tagging and signal types shared between the Strategy Evaluator
//! (component C) and the engine's monitor loop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Scalping,
    Momentum,
    MeanReversion,
    MacdSupertrend,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Scalping => "scalping",
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::MacdSupertrend => "macd_supertrend",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalping" => Ok(StrategyKind::Scalping),
            "momentum" => Ok(StrategyKind::Momentum),
            "mean_reversion" => Ok(StrategyKind::MeanReversion),
            "macd_supertrend" => Ok(StrategyKind::MacdSupertrend),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Ephemeral signal emitted by a strategy on a single evaluation pass
/// (spec §3). Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy: StrategyKind,
    pub side: Side,
    pub price: Decimal,
    pub detected_at: DateTime<Utc>,
}

impl StrategySignal {
    pub fn hold(strategy: StrategyKind, price: Decimal, detected_at: DateTime<Utc>) -> Self {
        Self {
            strategy,
            side: Side::Hold,
            price,
            detected_at,
        }
    }
}
