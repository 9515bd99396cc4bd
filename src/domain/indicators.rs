//! Pure functions over price series (component B, spec §4.B). No I/O;
//! nothing here suspends. The one piece of state that is *not* a pure
//! function of the candle window is the MACD bullish-crossover timestamp,
//! which depends on wall-clock time and is threaded through explicitly via
//! [`MacdCrossoverTracker`].

use crate::domain::types::Candle;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bollinger {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub width: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Macd {
    pub line: Decimal,
    pub signal: Decimal,
    /// Set iff a bullish crossover (MACD crossing above signal) happened
    /// within the last 30 minutes of real time.
    pub crossover_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Supertrend {
    pub value: Decimal,
    pub direction: TrendDirection,
}

/// The full derived record computed from a candle window (spec §3).
/// Ephemeral: recomputed every tick, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Indicators {
    pub current_price: Decimal,
    pub sma5: Decimal,
    pub sma10: Decimal,
    pub sma20: Decimal,
    pub bollinger: Bollinger,
    pub rsi14: Decimal,
    pub macd: Macd,
    pub atr14: Decimal,
    pub supertrend: Supertrend,
    pub adx14: Decimal,
    /// Current volume divided by the 20-period mean volume.
    pub volume_ratio: Decimal,
}

/// Tracks, per symbol, the last time MACD crossed above signal, so the
/// "within the last 30 minutes" crossover window (spec §4.B) can be
/// evaluated without re-deriving it from the whole candle history every
/// tick.
#[derive(Debug, Clone, Default)]
pub struct MacdCrossoverTracker {
    was_above: Option<bool>,
    last_bullish_crossover: Option<DateTime<Utc>>,
}

impl MacdCrossoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest (line, signal) pair and the candle's timestamp.
    /// Returns the crossover timestamp to store on the `Macd` record,
    /// `Some` only while the crossover is still within the 30-minute window.
    pub fn observe(&mut self, line: Decimal, signal: Decimal, at: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let is_above = line > signal;
        if let Some(was_above) = self.was_above {
            if !was_above && is_above {
                self.last_bullish_crossover = Some(at);
            }
        }
        self.was_above = Some(is_above);

        match self.last_bullish_crossover {
            Some(ts) if now.signed_duration_since(ts).num_minutes() <= 30 => Some(ts),
            _ => None,
        }
    }
}

fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

/// Simple moving average of the last `period` closes. Returns 0 if the
/// window is empty.
pub fn sma(candles: &[Candle], period: usize) -> Decimal {
    let cs = closes(candles);
    let window = &cs[cs.len().saturating_sub(period)..];
    if window.is_empty() {
        return Decimal::ZERO;
    }
    window.iter().sum::<Decimal>() / Decimal::from(window.len())
}

/// Exponential moving average over the full series, seeded by an SMA of
/// the first `period` values (the conventional warm-start).
pub fn ema_series(values: &[Decimal], period: usize) -> Vec<Decimal> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }
    if values.len() < period {
        // Not enough data for a warm-start SMA; seed with the first value.
        let k = dec!(2) / Decimal::from(period + 1);
        let mut out = Vec::with_capacity(values.len());
        let mut prev = values[0];
        out.push(prev);
        for &v in &values[1..] {
            prev = (v - prev) * k + prev;
            out.push(prev);
        }
        return out;
    }

    let k = dec!(2) / Decimal::from(period + 1);
    let seed = values[..period].iter().sum::<Decimal>() / Decimal::from(period);
    let mut out = vec![seed; period];
    let mut prev = seed;
    for &v in &values[period..] {
        prev = (v - prev) * k + prev;
        out.push(prev);
    }
    out
}

pub fn ema(candles: &[Candle], period: usize) -> Decimal {
    let cs = closes(candles);
    ema_series(&cs, period).last().copied().unwrap_or(Decimal::ZERO)
}

/// RSI14 with Wilder smoothing. Undefined (neutral 50) for windows shorter
/// than 14 periods (spec §4.B).
pub fn rsi(candles: &[Candle], period: usize) -> Decimal {
    let cs = closes(candles);
    if cs.len() < period + 1 {
        return dec!(50);
    }

    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for w in cs[..=period].windows(2) {
        let diff = w[1] - w[0];
        if diff > Decimal::ZERO {
            gains += diff;
        } else {
            losses += -diff;
        }
    }
    let mut avg_gain = gains / Decimal::from(period);
    let mut avg_loss = losses / Decimal::from(period);

    for w in cs[period..].windows(2) {
        let diff = w[1] - w[0];
        let (gain, loss) = if diff > Decimal::ZERO {
            (diff, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -diff)
        };
        avg_gain = (avg_gain * Decimal::from(period - 1) + gain) / Decimal::from(period);
        avg_loss = (avg_loss * Decimal::from(period - 1) + loss) / Decimal::from(period);
    }

    if avg_loss.is_zero() {
        return dec!(100);
    }
    let rs = avg_gain / avg_loss;
    dec!(100) - (dec!(100) / (Decimal::ONE + rs))
}

/// MACD line and signal. MACD = EMA12 - EMA26; signal = EMA9 of the MACD
/// series (spec §4.B).
pub fn macd_raw(candles: &[Candle], fast: usize, slow: usize, signal_period: usize) -> (Decimal, Decimal) {
    let cs = closes(candles);
    let ema_fast = ema_series(&cs, fast);
    let ema_slow = ema_series(&cs, slow);
    let n = ema_fast.len().min(ema_slow.len());
    if n == 0 {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let macd_line: Vec<Decimal> = (0..n)
        .map(|i| ema_fast[ema_fast.len() - n + i] - ema_slow[ema_slow.len() - n + i])
        .collect();
    let signal_series = ema_series(&macd_line, signal_period);
    let line = *macd_line.last().unwrap();
    let signal = signal_series.last().copied().unwrap_or(Decimal::ZERO);
    (line, signal)
}

fn true_range(prev_close: Decimal, high: Decimal, low: Decimal) -> Decimal {
    let a = high - low;
    let b = (high - prev_close).abs();
    let c = (low - prev_close).abs();
    a.max(b).max(c)
}

/// ATR with Wilder smoothing over `period` periods (spec §4.B).
pub fn atr(candles: &[Candle], period: usize) -> Decimal {
    if candles.len() < 2 {
        return Decimal::ZERO;
    }
    let mut trs = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        trs.push(true_range(w[0].close, w[1].high, w[1].low));
    }
    wilder_smooth(&trs, period)
}

fn wilder_smooth(values: &[Decimal], period: usize) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    if values.len() < period {
        return values.iter().sum::<Decimal>() / Decimal::from(values.len());
    }
    let mut avg = values[..period].iter().sum::<Decimal>() / Decimal::from(period);
    for &v in &values[period..] {
        avg = (avg * Decimal::from(period - 1) + v) / Decimal::from(period);
    }
    avg
}

/// Supertrend with ATR-band multiplier 3 (spec §4.B). Direction flips only
/// when a close crosses the current band, computed over the whole window
/// so the flip rule is a pure function of history.
pub fn supertrend(candles: &[Candle], atr_period: usize, multiplier: Decimal) -> Supertrend {
    if candles.len() < 2 {
        let price = candles.last().map(|c| c.close).unwrap_or(Decimal::ZERO);
        return Supertrend {
            value: price,
            direction: TrendDirection::Bullish,
        };
    }

    let mut direction = TrendDirection::Bullish;
    let mut final_upper = Decimal::ZERO;
    let mut final_lower = Decimal::ZERO;
    let mut value = candles[0].close;

    for i in 1..candles.len() {
        let window = &candles[..=i];
        let atr_val = atr(window, atr_period);
        let hl2 = (candles[i].high + candles[i].low) / dec!(2);
        let basic_upper = hl2 + multiplier * atr_val;
        let basic_lower = hl2 - multiplier * atr_val;

        let upper = if basic_upper < final_upper || candles[i - 1].close > final_upper {
            basic_upper
        } else {
            final_upper
        };
        let lower = if basic_lower > final_lower || candles[i - 1].close < final_lower {
            basic_lower
        } else {
            final_lower
        };

        direction = match direction {
            TrendDirection::Bullish if candles[i].close < lower => TrendDirection::Bearish,
            TrendDirection::Bearish if candles[i].close > upper => TrendDirection::Bullish,
            other => other,
        };

        value = match direction {
            TrendDirection::Bullish => lower,
            TrendDirection::Bearish => upper,
        };
        final_upper = upper;
        final_lower = lower;
    }

    Supertrend { value, direction }
}

/// ADX14: average directional index, Wilder-smoothed.
pub fn adx(candles: &[Candle], period: usize) -> Decimal {
    if candles.len() < period + 1 {
        return Decimal::ZERO;
    }

    let mut plus_dm = Vec::with_capacity(candles.len() - 1);
    let mut minus_dm = Vec::with_capacity(candles.len() - 1);
    let mut trs = Vec::with_capacity(candles.len() - 1);

    for w in candles.windows(2) {
        let up_move = w[1].high - w[0].high;
        let down_move = w[0].low - w[1].low;

        let plus = if up_move > down_move && up_move > Decimal::ZERO {
            up_move
        } else {
            Decimal::ZERO
        };
        let minus = if down_move > up_move && down_move > Decimal::ZERO {
            down_move
        } else {
            Decimal::ZERO
        };

        plus_dm.push(plus);
        minus_dm.push(minus);
        trs.push(true_range(w[0].close, w[1].high, w[1].low));
    }

    let atr_smoothed = wilder_smooth(&trs, period);
    if atr_smoothed.is_zero() {
        return Decimal::ZERO;
    }
    let plus_di = dec!(100) * wilder_smooth(&plus_dm, period) / atr_smoothed;
    let minus_di = dec!(100) * wilder_smooth(&minus_dm, period) / atr_smoothed;

    let di_sum = plus_di + minus_di;
    if di_sum.is_zero() {
        return Decimal::ZERO;
    }
    let dx = dec!(100) * (plus_di - minus_di).abs() / di_sum;
    dx
}

/// Bollinger bands: SMA20 +/- 2 standard deviations (spec §4.B).
pub fn bollinger(candles: &[Candle], period: usize, std_devs: Decimal) -> Bollinger {
    let cs = closes(candles);
    let window = &cs[cs.len().saturating_sub(period)..];
    if window.is_empty() {
        return Bollinger {
            upper: Decimal::ZERO,
            middle: Decimal::ZERO,
            lower: Decimal::ZERO,
            width: Decimal::ZERO,
        };
    }
    let middle = window.iter().sum::<Decimal>() / Decimal::from(window.len());
    let variance = window.iter().map(|v| (*v - middle) * (*v - middle)).sum::<Decimal>()
        / Decimal::from(window.len());
    let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);

    let upper = middle + std_devs * std_dev;
    let lower = middle - std_devs * std_dev;
    Bollinger {
        upper,
        middle,
        lower,
        width: upper - lower,
    }
}

/// Ratio of the current bar's volume to the mean volume over `period` bars.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Decimal {
    let current = match candles.last() {
        Some(c) => c.volume,
        None => return Decimal::ONE,
    };
    let volumes: Vec<Decimal> = candles.iter().rev().skip(1).take(period).map(|c| c.volume).collect();
    if volumes.is_empty() {
        return Decimal::ONE;
    }
    let mean = volumes.iter().sum::<Decimal>() / Decimal::from(volumes.len());
    if mean.is_zero() {
        return Decimal::ONE;
    }
    current / mean
}

/// Computes the full [`Indicators`] record in one pass, mirroring the
/// FeatureSet-builder shape but with the richer field set spec.md names.
pub fn compute(candles: &[Candle], crossover: &mut MacdCrossoverTracker, now: DateTime<Utc>) -> Indicators {
    let current_price = candles.last().map(|c| c.close).unwrap_or(Decimal::ZERO);
    let (macd_line, macd_signal) = macd_raw(candles, 12, 26, 9);
    let crossover_at = candles
        .last()
        .map(|c| crossover.observe(macd_line, macd_signal, c.timestamp, now))
        .unwrap_or(None);

    Indicators {
        current_price,
        sma5: sma(candles, 5),
        sma10: sma(candles, 10),
        sma20: sma(candles, 20),
        bollinger: bollinger(candles, 20, dec!(2)),
        rsi14: rsi(candles, 14),
        macd: Macd {
            line: macd_line,
            signal: macd_signal,
            crossover_at,
        },
        atr14: atr(candles, 14),
        supertrend: supertrend(candles, 14, dec!(3)),
        adx14: adx(candles, 14),
        volume_ratio: volume_ratio(candles, 20),
    }
}
