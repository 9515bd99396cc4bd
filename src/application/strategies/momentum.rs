use super::{Strategy, StrategyContext};
use crate::domain::strategy::{Side, StrategyKind, StrategySignal};
use rust_decimal_macros::dec;

/// BUY on a rising short/long SMA spread (spec §4.C). Strategy-SELL when
/// the spread collapses below -0.3% and the position has been held at
/// least `min_hold_minutes`.
pub struct Momentum;

impl Strategy for Momentum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn evaluate_entry(&self, ctx: &StrategyContext) -> StrategySignal {
        let sma5 = ctx.indicators.sma5;
        let sma20 = ctx.indicators.sma20;
        let side = if sma20 != rust_decimal::Decimal::ZERO
            && sma5 > sma20
            && ctx.current_price > sma5
            && (sma5 - sma20) / sma20 >= dec!(0.0015)
        {
            Side::Buy
        } else {
            Side::Hold
        };
        StrategySignal {
            strategy: StrategyKind::Momentum,
            side,
            price: ctx.current_price,
            detected_at: ctx.now,
        }
    }

    fn evaluate_exit(&self, ctx: &StrategyContext) -> bool {
        let sma5 = ctx.indicators.sma5;
        let sma20 = ctx.indicators.sma20;
        if sma20.is_zero() {
            return false;
        }
        let spread = (sma5 - sma20) / sma20;
        spread <= dec!(-0.003) && ctx.hold_minutes() >= ctx.min_hold_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{Bollinger, Indicators, Macd, Supertrend, TrendDirection};
    use crate::domain::position::Position;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn indicators(sma5: Decimal, sma20: Decimal) -> Indicators {
        Indicators {
            current_price: Decimal::ZERO,
            sma5,
            sma10: Decimal::ZERO,
            sma20,
            bollinger: Bollinger {
                upper: Decimal::ZERO,
                middle: Decimal::ZERO,
                lower: Decimal::ZERO,
                width: Decimal::ZERO,
            },
            rsi14: dec!(50),
            macd: Macd {
                line: Decimal::ZERO,
                signal: Decimal::ZERO,
                crossover_at: None,
            },
            atr14: Decimal::ZERO,
            supertrend: Supertrend {
                value: Decimal::ZERO,
                direction: TrendDirection::Bullish,
            },
            adx14: Decimal::ZERO,
            volume_ratio: dec!(1),
        }
    }

    #[test]
    fn buys_when_spread_exceeds_fifteen_bps() {
        let ind = indicators(dec!(100.2), dec!(100));
        let ctx = StrategyContext {
            current_price: dec!(100.3),
            indicators: &ind,
            position: None,
            min_hold_minutes: 8,
            now: Utc::now(),
        };
        assert_eq!(Momentum.evaluate_entry(&ctx).side, Side::Buy);
    }

    #[test]
    fn holds_when_spread_too_small() {
        let ind = indicators(dec!(100.05), dec!(100));
        let ctx = StrategyContext {
            current_price: dec!(100.1),
            indicators: &ind,
            position: None,
            min_hold_minutes: 8,
            now: Utc::now(),
        };
        assert_eq!(Momentum.evaluate_entry(&ctx).side, Side::Hold);
    }

    #[test]
    fn exits_only_after_min_hold_elapsed() {
        let ind = indicators(dec!(96.5), dec!(100));
        let now = Utc::now();

        let fresh_position = Position::new(
            "BTCUSD".to_string(),
            dec!(1),
            dec!(100),
            now - Duration::minutes(2),
            StrategyKind::Momentum,
            dec!(10),
            dec!(2),
            dec!(4),
            dec!(2),
        );
        let ctx = StrategyContext {
            current_price: dec!(97),
            indicators: &ind,
            position: Some(&fresh_position),
            min_hold_minutes: 8,
            now,
        };
        assert!(!Momentum.evaluate_exit(&ctx));

        let aged_position = Position::new(
            "BTCUSD".to_string(),
            dec!(1),
            dec!(100),
            now - Duration::minutes(9),
            StrategyKind::Momentum,
            dec!(10),
            dec!(2),
            dec!(4),
            dec!(2),
        );
        let ctx_later = StrategyContext {
            current_price: dec!(97),
            indicators: &ind,
            position: Some(&aged_position),
            min_hold_minutes: 8,
            now,
        };
        assert!(Momentum.evaluate_exit(&ctx_later));
    }
}
