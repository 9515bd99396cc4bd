use super::{Strategy, StrategyContext};
use crate::domain::strategy::{Side, StrategyKind, StrategySignal};
use rust_decimal_macros::dec;

/// BUY below the lower Bollinger band, or on an oversold RSI near the band
/// (spec §4.C). Strategy-SELL on a return to the middle band with modest
/// profit, a break above the upper band, or a larger profit target.
pub struct MeanReversion;

impl Strategy for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn evaluate_entry(&self, ctx: &StrategyContext) -> StrategySignal {
        let bb = &ctx.indicators.bollinger;
        let near_lower = if bb.lower.is_zero() {
            false
        } else {
            ((ctx.current_price - bb.lower) / bb.lower).abs() <= dec!(0.005)
        };
        let oversold_near_band = ctx.indicators.rsi14 < dec!(35) && near_lower;
        let side = if ctx.current_price < bb.lower || oversold_near_band {
            Side::Buy
        } else {
            Side::Hold
        };
        StrategySignal {
            strategy: StrategyKind::MeanReversion,
            side,
            price: ctx.current_price,
            detected_at: ctx.now,
        }
    }

    fn evaluate_exit(&self, ctx: &StrategyContext) -> bool {
        let bb = &ctx.indicators.bollinger;
        let profit_percent = ctx.profit_percent();
        (ctx.current_price >= bb.middle && profit_percent >= dec!(1.5))
            || ctx.current_price > bb.upper
            || profit_percent >= dec!(2.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{Bollinger, Indicators, Macd, Supertrend, TrendDirection};
    use crate::domain::position::Position;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn indicators(lower: Decimal, middle: Decimal, upper: Decimal, rsi: Decimal) -> Indicators {
        Indicators {
            current_price: Decimal::ZERO,
            sma5: Decimal::ZERO,
            sma10: Decimal::ZERO,
            sma20: Decimal::ZERO,
            bollinger: Bollinger {
                upper,
                middle,
                lower,
                width: upper - lower,
            },
            rsi14: rsi,
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
    fn buys_below_lower_band() {
        let ind = indicators(dec!(95), dec!(100), dec!(105), dec!(50));
        let ctx = StrategyContext {
            current_price: dec!(94),
            indicators: &ind,
            position: None,
            min_hold_minutes: 5,
            now: Utc::now(),
        };
        assert_eq!(MeanReversion.evaluate_entry(&ctx).side, Side::Buy);
    }

    #[test]
    fn buys_on_oversold_rsi_near_lower_band() {
        let ind = indicators(dec!(95), dec!(100), dec!(105), dec!(30));
        let ctx = StrategyContext {
            current_price: dec!(95.2),
            indicators: &ind,
            position: None,
            min_hold_minutes: 5,
            now: Utc::now(),
        };
        assert_eq!(MeanReversion.evaluate_entry(&ctx).side, Side::Buy);
    }

    #[test]
    fn exits_on_return_to_middle_band_with_profit() {
        let ind = indicators(dec!(95), dec!(100), dec!(105), dec!(50));
        let now = Utc::now();
        let position = Position::new(
            "ETHUSD".to_string(),
            dec!(1),
            dec!(98.5),
            now,
            StrategyKind::MeanReversion,
            dec!(10),
            dec!(2),
            dec!(2.5),
            dec!(2),
        );
        let ctx = StrategyContext {
            current_price: dec!(100),
            indicators: &ind,
            position: Some(&position),
            min_hold_minutes: 5,
            now,
        };
        assert!(MeanReversion.evaluate_exit(&ctx));
    }
}
