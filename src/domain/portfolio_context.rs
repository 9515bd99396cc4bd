//! Derived snapshot passed to the AI Ensemble (spec §3). Built fresh each
//! time an entry candidate needs validation; never persisted.

use crate::domain::strategy::StrategyKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub open_positions_count: usize,
    pub max_positions: usize,
    pub per_strategy_counts: HashMap<StrategyKind, usize>,
    pub total_exposure_usd: Decimal,
    pub daily_pnl_usd: Decimal,
    pub symbols_held: Vec<String>,
}
