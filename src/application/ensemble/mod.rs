//! AI Ensemble (component D, spec §4.D): four concurrent sub-scorers fed
//! into a weighted-vote aggregator. `Scorer` is the capability set spec §9
//! calls out — "a sum type or interface with four concrete implementations;
//! the aggregator is generic over the set."

pub mod aggregator;
pub mod llm;
pub mod macro_scorer;
pub mod sentiment;
pub mod technical;

use crate::config::Config;
use crate::domain::ai::ScoreResult;
use crate::domain::indicators::Indicators;
use crate::domain::portfolio_context::PortfolioContext;
use crate::domain::trade_record::TradeRecord;
use crate::domain::types::Candle;
use crate::domain::volatility::VolatilityMetrics;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use aggregator::Aggregator;

/// The full market snapshot every scorer sees (spec §4.D "input bundle").
pub struct EnsembleContext<'a> {
    pub symbol: &'a str,
    pub current_price: Decimal,
    pub candles: &'a [Candle],
    pub indicators: &'a Indicators,
    pub portfolio: &'a PortfolioContext,
    pub volatility: &'a VolatilityMetrics,
    pub recent_trades: &'a [TradeRecord],
    pub config: &'a Config,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self, config: &Config) -> Decimal;
    fn enabled(&self, config: &Config) -> bool;
    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult;
}
