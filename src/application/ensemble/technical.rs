use super::{EnsembleContext, Scorer};
use crate::config::Config;
use crate::domain::ai::ScoreResult;
use crate::domain::indicators::TrendDirection;
use crate::domain::strategy::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Closed-form rules over RSI/MACD/ADX/volume (spec §4.D #2). No I/O;
/// never fails.
pub struct TechnicalScorer;

#[async_trait]
impl Scorer for TechnicalScorer {
    fn name(&self) -> &'static str {
        "technical"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.technical
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.technical
    }

    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult {
        let ind = ctx.indicators;
        let mut bullish_votes = 0u32;
        let mut bearish_votes = 0u32;
        let mut total_votes = 0u32;

        total_votes += 1;
        if ind.rsi14 < dec!(30) {
            bullish_votes += 1;
        } else if ind.rsi14 > dec!(70) {
            bearish_votes += 1;
        }

        total_votes += 1;
        if ind.macd.line > ind.macd.signal {
            bullish_votes += 1;
        } else {
            bearish_votes += 1;
        }

        total_votes += 1;
        if ind.supertrend.direction == TrendDirection::Bullish {
            bullish_votes += 1;
        } else {
            bearish_votes += 1;
        }

        total_votes += 1;
        if ind.adx14 > dec!(25) && ind.volume_ratio >= dec!(1.2) {
            bullish_votes += 1;
        }

        let side = if bullish_votes > bearish_votes {
            Side::Buy
        } else if bearish_votes > bullish_votes {
            Side::Sell
        } else {
            Side::Hold
        };
        let winning_votes = bullish_votes.max(bearish_votes);
        let confidence = Decimal::from(winning_votes) / Decimal::from(total_votes.max(1));

        ScoreResult::simple(side, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{Bollinger, Indicators, Macd, Supertrend};
    use crate::domain::portfolio_context::PortfolioContext;
    use crate::domain::types::Candle;
    use crate::domain::volatility::{VolatilityMetrics, VolatilityRegime};
    use chrono::Utc;
    use std::collections::HashMap;

    fn bullish_ctx() -> (Indicators, PortfolioContext, VolatilityMetrics, Vec<Candle>) {
        let indicators = Indicators {
            current_price: dec!(100),
            sma5: dec!(0),
            sma10: dec!(0),
            sma20: dec!(0),
            bollinger: Bollinger {
                upper: dec!(0),
                middle: dec!(0),
                lower: dec!(0),
                width: dec!(0),
            },
            rsi14: dec!(25),
            macd: Macd {
                line: dec!(1),
                signal: dec!(0),
                crossover_at: None,
            },
            atr14: dec!(1),
            supertrend: Supertrend {
                value: dec!(95),
                direction: TrendDirection::Bullish,
            },
            adx14: dec!(30),
            volume_ratio: dec!(1.5),
        };
        let portfolio = PortfolioContext {
            open_positions_count: 0,
            max_positions: 10,
            per_strategy_counts: HashMap::new(),
            total_exposure_usd: dec!(0),
            daily_pnl_usd: dec!(0),
            symbols_held: Vec::new(),
        };
        let volatility = VolatilityMetrics {
            atr_absolute: dec!(1),
            atr_percent: dec!(1),
            regime: VolatilityRegime::Normal,
            avg_daily_range_percent: dec!(2),
        };
        (indicators, portfolio, volatility, Vec::new())
    }

    #[tokio::test]
    async fn scores_buy_when_all_rules_align_bullish() {
        let (indicators, portfolio, volatility, candles) = bullish_ctx();
        let config = Config::default();
        let ctx = EnsembleContext {
            symbol: "BTCUSD",
            current_price: dec!(100),
            candles: &candles,
            indicators: &indicators,
            portfolio: &portfolio,
            volatility: &volatility,
            recent_trades: &[],
            config: &config,
        };
        let result = TechnicalScorer.analyze(&ctx).await;
        assert_eq!(result.side, Side::Buy);
    }
}
