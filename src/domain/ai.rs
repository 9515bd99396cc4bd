//! The AI Ensemble's shared vocabulary (spec §3/§4.D): what a single
//! scorer returns, and what the aggregator produces.

use crate::domain::position::{
    clamp_position_size_percent, clamp_stop_loss_percent, clamp_take_profit_percent,
};
use crate::domain::strategy::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a single sub-scorer returns (spec §9: "four variants over the
/// capability set {analyze, weight, enabled}").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreResult {
    pub side: Side,
    pub confidence: Decimal,
    /// Populated only by language-model-style scorers (spec §4.D #4); the
    /// other three always leave this `None`.
    pub proposed_parameters: Option<AiParameters>,
}

impl ScoreResult {
    pub fn neutral_hold(confidence: Decimal) -> Self {
        Self {
            side: Side::Hold,
            confidence,
            proposed_parameters: None,
        }
    }

    pub fn simple(side: Side, confidence: Decimal) -> Self {
        Self {
            side,
            confidence,
            proposed_parameters: None,
        }
    }
}

/// Autonomous risk parameters proposed by the language-model scorer, or
/// per-strategy defaults when it produced none (spec §4.D).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiParameters {
    pub position_size_percent: Decimal,
    pub stop_loss_percent: Decimal,
    pub take_profit_percent: Decimal,
    pub risk_reward_ratio: Decimal,
}

impl AiParameters {
    /// Clamps every field into the ranges required by the Position
    /// invariants (spec §3), regardless of what the model proposed.
    pub fn clamped(self) -> Self {
        Self {
            position_size_percent: clamp_position_size_percent(self.position_size_percent),
            stop_loss_percent: clamp_stop_loss_percent(self.stop_loss_percent),
            take_profit_percent: clamp_take_profit_percent(self.take_profit_percent),
            risk_reward_ratio: self.risk_reward_ratio,
        }
    }
}

/// The ensemble's aggregated decision (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIVerdict {
    pub signal: Side,
    pub confidence: Decimal,
    pub reasoning: String,
    pub parameters: AiParameters,
    pub per_model: HashMap<String, ScoreResult>,
}

impl AIVerdict {
    /// The rejection verdict used whenever the ensemble refuses to buy:
    /// disabled gate, below-confidence, or a non-BUY argmax.
    pub fn reject(reasoning: impl Into<String>, per_model: HashMap<String, ScoreResult>) -> Self {
        Self {
            signal: Side::Hold,
            confidence: Decimal::ZERO,
            reasoning: reasoning.into(),
            parameters: AiParameters {
                position_size_percent: Decimal::ZERO,
                stop_loss_percent: Decimal::ZERO,
                take_profit_percent: Decimal::ZERO,
                risk_reward_ratio: Decimal::ZERO,
            },
            per_model,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self.signal, Side::Buy)
    }
}
