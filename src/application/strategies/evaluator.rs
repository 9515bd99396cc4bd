use super::{strategy_for, StrategyContext};
use crate::domain::strategy::{Side, StrategyKind, StrategySignal};

/// Evaluates a pair's configured strategies in order and returns the first
/// BUY candidate (spec §4.C). Tie-breaking is first-in-config-order; the
/// winner's tag is what the engine records on the resulting position.
pub struct Evaluator {
    strategies: Vec<StrategyKind>,
}

impl Evaluator {
    pub fn new(strategies: Vec<StrategyKind>) -> Self {
        Self { strategies }
    }

    pub fn entry_candidate(&self, ctx: &StrategyContext) -> StrategySignal {
        for kind in &self.strategies {
            let signal = strategy_for(*kind).evaluate_entry(ctx);
            if signal.side == Side::Buy {
                return signal;
            }
        }
        StrategySignal::hold(
            self.strategies.first().copied().unwrap_or(StrategyKind::Scalping),
            ctx.current_price,
            ctx.now,
        )
    }

    /// Strategy-owned secondary exit check (spec §4.E step 8), consulted
    /// only for the strategy tag recorded on the open position.
    pub fn exit_signal(&self, kind: StrategyKind, ctx: &StrategyContext) -> bool {
        strategy_for(kind).evaluate_exit(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{Bollinger, Indicators, Macd, Supertrend, TrendDirection};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn first_configured_strategy_to_fire_wins() {
        let indicators = Indicators {
            current_price: dec!(0),
            sma5: dec!(0),
            sma10: dec!(100),
            sma20: dec!(0),
            bollinger: Bollinger {
                upper: dec!(0),
                middle: dec!(0),
                lower: dec!(0),
                width: dec!(0),
            },
            rsi14: dec!(50),
            macd: Macd {
                line: dec!(0),
                signal: dec!(0),
                crossover_at: None,
            },
            atr14: dec!(0),
            supertrend: Supertrend {
                value: dec!(0),
                direction: TrendDirection::Bullish,
            },
            adx14: dec!(0),
            volume_ratio: dec!(1),
        };
        let ctx = StrategyContext {
            current_price: dec!(99), // triggers scalping (<= sma10 * 0.992)
            indicators: &indicators,
            position: None,
            min_hold_minutes: 3,
            now: Utc::now(),
        };
        let evaluator = Evaluator::new(vec![StrategyKind::MeanReversion, StrategyKind::Scalping]);
        let signal = evaluator.entry_candidate(&ctx);
        assert_eq!(signal.strategy, StrategyKind::Scalping);
        assert_eq!(signal.side, Side::Buy);
    }
}
