//! Append-only trade history entries (spec §3). Written once per terminal
//! event; never mutated after the fact.

use crate::domain::strategy::StrategyKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StrategyEntry,
    TakeProfit,
    StopLoss,
    TrailingStop,
    /// Momentum/mean-reversion strategy-owned secondary exit (§4.E step 8).
    StrategyExit,
    DustPurge,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub reason: ExitReason,
    pub pnl_usd: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub strategy: StrategyKind,
    pub ai_confidence: Option<Decimal>,
    pub order_id: String,
    pub trade_id: Uuid,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn entry(
        timestamp: DateTime<Utc>,
        symbol: String,
        quantity: Decimal,
        price: Decimal,
        strategy: StrategyKind,
        ai_confidence: Decimal,
        order_id: String,
        trade_id: Uuid,
    ) -> Self {
        Self {
            timestamp,
            symbol,
            action: TradeAction::Buy,
            quantity,
            price,
            reason: ExitReason::StrategyEntry,
            pnl_usd: None,
            pnl_percent: None,
            strategy,
            ai_confidence: Some(ai_confidence),
            order_id,
            trade_id,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn exit(
        timestamp: DateTime<Utc>,
        symbol: String,
        quantity: Decimal,
        price: Decimal,
        reason: ExitReason,
        pnl_usd: Decimal,
        pnl_percent: Decimal,
        strategy: StrategyKind,
        order_id: String,
        trade_id: Uuid,
    ) -> Self {
        Self {
            timestamp,
            symbol,
            action: TradeAction::Sell,
            quantity,
            price,
            reason,
            pnl_usd: Some(pnl_usd),
            pnl_percent: Some(pnl_percent),
            strategy,
            ai_confidence: None,
            order_id,
            trade_id,
        }
    }
}
