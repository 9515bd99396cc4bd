use super::{Strategy, StrategyContext};
use crate::domain::strategy::{Side, StrategyKind, StrategySignal};
use rust_decimal_macros::dec;

/// BUY on a quick dip below SMA10 (spec §4.C): `price <= SMA10 * (1 - 0.008)`.
/// Exit is stop-loss/take-profit only; no strategy-owned SELL.
pub struct Scalping;

impl Strategy for Scalping {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Scalping
    }

    fn evaluate_entry(&self, ctx: &StrategyContext) -> StrategySignal {
        let threshold = ctx.indicators.sma10 * (dec!(1) - dec!(0.008));
        let side = if ctx.current_price <= threshold { Side::Buy } else { Side::Hold };
        StrategySignal {
            strategy: StrategyKind::Scalping,
            side,
            price: ctx.current_price,
            detected_at: ctx.now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::{Bollinger, Indicators, Macd, Supertrend, TrendDirection};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn indicators_with_sma10(sma10: Decimal) -> Indicators {
        Indicators {
            current_price: Decimal::ZERO,
            sma5: Decimal::ZERO,
            sma10,
            sma20: Decimal::ZERO,
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
    fn buys_when_price_drops_eight_tenths_percent_below_sma10() {
        let indicators = indicators_with_sma10(dec!(100));
        let ctx = StrategyContext {
            current_price: dec!(99.1),
            indicators: &indicators,
            position: None,
            min_hold_minutes: 3,
            now: Utc::now(),
        };
        assert_eq!(Scalping.evaluate_entry(&ctx).side, Side::Buy);
    }

    #[test]
    fn holds_when_price_is_close_to_sma10() {
        let indicators = indicators_with_sma10(dec!(100));
        let ctx = StrategyContext {
            current_price: dec!(99.5),
            indicators: &indicators,
            position: None,
            min_hold_minutes: 3,
            now: Utc::now(),
        };
        assert_eq!(Scalping.evaluate_entry(&ctx).side, Side::Hold);
    }
}
