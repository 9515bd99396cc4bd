use super::{Strategy, StrategyContext};
use crate::domain::indicators::TrendDirection;
use crate::domain::strategy::{Side, StrategyKind, StrategySignal};
use rust_decimal_macros::dec;

/// BUY on a fresh MACD bullish crossover confirmed by Supertrend, volume,
/// RSI, and ADX (spec §4.C). No strategy-owned SELL — exit is
/// trailing-stop-only, handled by the monitor loop.
pub struct MacdSupertrend;

impl Strategy for MacdSupertrend {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MacdSupertrend
    }

    fn evaluate_entry(&self, ctx: &StrategyContext) -> StrategySignal {
        let fresh_crossover = ctx.indicators.macd.crossover_at.is_some();
        let above_supertrend =
            ctx.current_price > ctx.indicators.supertrend.value && ctx.indicators.supertrend.direction == TrendDirection::Bullish;
        let side = if fresh_crossover
            && above_supertrend
            && ctx.indicators.volume_ratio >= dec!(1.5)
            && ctx.indicators.rsi14 < dec!(70)
            && ctx.indicators.adx14 > dec!(20)
        {
            Side::Buy
        } else {
            Side::Hold
        };
        StrategySignal {
            strategy: StrategyKind::MacdSupertrend,
            side,
            price: ctx.current_price,
            detected_at: ctx.now,
        }
    }
}
