//! Monitor pipeline (spec §4.E "Monitor pipeline (per open position)"):
//! the eight-step exit-condition chain run once per tick for every open
//! position, plus the five-attempt sell retry it hands off to.

use super::retry::{retry_with_schedule, SELL_RETRY_SCHEDULE};
use super::state::{begin_closing, mark_retry_exhausted};
use super::Engine;
use crate::application::strategies::{Evaluator, StrategyContext};
use crate::domain::errors::ExchangeError;
use crate::domain::position::Position;
use crate::domain::strategy::StrategyKind;
use crate::domain::trade_record::{ExitReason, TradeRecord};
use chrono::Utc;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{error, info, warn};

/// Three attempts, 2s apart, re-fetching the price each time (spec §4.E
/// step 1).
const PRICE_FETCH_SCHEDULE: [Duration; 3] = [Duration::from_secs(2), Duration::from_secs(2), Duration::from_secs(2)];

pub async fn run(symbol: &str, engine: &Engine) {
    let _serialization = engine.state.lock_for(symbol).lock().await;

    // A position may have been closed by a concurrent tick's tail; bail
    // cleanly if it's already gone.
    let Some(position) = engine.state.positions.read().await.get(symbol).cloned() else {
        return;
    };

    // 1. Fetch current price with retry.
    let symbol_owned = symbol.to_string();
    let price_result = retry_with_schedule("fetch_ticker (monitor)", &PRICE_FETCH_SCHEDULE, || {
        let symbol_owned = symbol_owned.clone();
        async move { engine.exchange.fetch_ticker(&symbol_owned).await }
    })
    .await;
    let current_price = match price_result {
        Ok(price) => price,
        Err(e) => {
            warn!(symbol, error = %e, "monitor: price unavailable after retry, skipping this position this tick");
            return;
        }
    };

    let config = engine.config.current().await;

    // 2. Dust purge.
    if position.is_dust(current_price, config.min_order_value_usd) {
        purge_as_dust(engine, &position, current_price).await;
        return;
    }

    // 3. Update highest_price_seen.
    let mut position = position;
    position.observe_price(current_price);

    // 4. profit_percent.
    let profit_percent = position.profit_percent(current_price);

    let risk = config.strategies.get(&position.strategy).copied();
    let stop_loss_percent = if position.ai_stop_loss_percent.is_zero() {
        risk.map(|r| r.stop_loss_percent).unwrap_or(crate::domain::position::DEFAULT_STOP_LOSS_PERCENT)
    } else {
        position.ai_stop_loss_percent
    };
    let take_profit_percent = if position.ai_take_profit_percent.is_zero() {
        risk.map(|r| r.take_profit_percent).unwrap_or(crate::domain::position::DEFAULT_TAKE_PROFIT_PERCENT)
    } else {
        position.ai_take_profit_percent
    };

    // 5. Trailing stop.
    if let Some(risk) = risk {
        if risk.trailing_stop.enabled {
            if !position.trailing_stop_armed && profit_percent >= risk.trailing_stop.activation_percent {
                position.trailing_stop_armed = true;
            }
            if position.trailing_stop_armed {
                let trailing_stop_price = position.highest_price_seen * (Decimal::ONE - risk.trailing_stop.distance_percent / Decimal::from(100));
                if current_price <= trailing_stop_price {
                    exit_position(engine, position, current_price, ExitReason::TrailingStop).await;
                    return;
                }
            }
        }
    }

    // 6. Stop-loss.
    if profit_percent <= -stop_loss_percent {
        exit_position(engine, position, current_price, ExitReason::StopLoss).await;
        return;
    }

    // 7. Take-profit.
    if profit_percent >= take_profit_percent {
        exit_position(engine, position, current_price, ExitReason::TakeProfit).await;
        return;
    }

    // 8. Strategy-SELL (momentum, mean_reversion only).
    if matches!(position.strategy, StrategyKind::Momentum | StrategyKind::MeanReversion) {
        let now = Utc::now();
        let min_hold_minutes = risk.map(|r| r.min_hold_minutes).unwrap_or(0);
        if position.hold_minutes(now) >= min_hold_minutes {
            let indicators = match fetch_indicators(engine, symbol, now).await {
                Some(i) => i,
                None => {
                    persist_open_state(engine, &position).await;
                    return;
                }
            };
            let evaluator = Evaluator::new(vec![position.strategy]);
            let ctx = StrategyContext {
                current_price,
                indicators: &indicators,
                position: Some(&position),
                min_hold_minutes,
                now,
            };
            if evaluator.exit_signal(position.strategy, &ctx) {
                exit_position(engine, position, current_price, ExitReason::StrategyExit).await;
                return;
            }
        }
    }

    persist_open_state(engine, &position).await;
}

async fn fetch_indicators(engine: &Engine, symbol: &str, now: chrono::DateTime<Utc>) -> Option<crate::domain::indicators::Indicators> {
    let candles = engine.exchange.fetch_ohlcv(symbol, "1h", 100).await.ok()?;
    if candles.is_empty() {
        return None;
    }
    let mut trackers = engine.state.crossover_trackers.lock().await;
    let tracker = trackers.entry(symbol.to_string()).or_insert_with(crate::domain::indicators::MacdCrossoverTracker::new);
    Some(crate::domain::indicators::compute(&candles, tracker, now))
}

/// Writes back `highest_price_seen`/`trailing_stop_armed` mutations made
/// this tick for a position that is staying open.
async fn persist_open_state(engine: &Engine, position: &Position) {
    engine.state.positions.write().await.insert(position.symbol.clone(), position.clone());
    let snapshot = engine.state.snapshot_positions().await;
    if let Err(e) = engine.position_store.save_all(&snapshot).await {
        error!(symbol = %position.symbol, error = %e, "failed to persist position state");
    }
}

/// Direct dust purge (spec §4.E step 2): no sell order is attempted.
async fn purge_as_dust(engine: &Engine, position: &Position, current_price: Decimal) {
    engine.state.positions.write().await.remove(&position.symbol);
    let snapshot = engine.state.snapshot_positions().await;
    if let Err(e) = engine.position_store.save_all(&snapshot).await {
        error!(symbol = %position.symbol, error = %e, "failed to persist position removal (dust purge)");
    }
    crate::infrastructure::observability::metrics::open_positions().set(snapshot.len() as i64);

    let record = TradeRecord::exit(
        Utc::now(),
        position.symbol.clone(),
        position.quantity,
        current_price,
        ExitReason::DustPurge,
        Decimal::ZERO,
        Decimal::ZERO,
        position.strategy,
        "dust-purge-no-order".to_string(),
        position.trade_id,
    );
    if let Err(e) = engine.trade_store.append(&record).await {
        error!(symbol = %position.symbol, error = %e, "failed to append DUST_PURGE trade record");
    }
    crate::infrastructure::observability::metrics::trades_total().with_label_values(&["SELL", "DUST_PURGE"]).inc();
    info!(symbol = %position.symbol, "purged dust position, no sell order attempted");
}

/// Exits a position via `market_sell` with the five-attempt retry
/// schedule (spec §4.E "_execute_sell_with_retry"). Each attempt
/// re-fetches the current price before selling, per spec §4.E; a failed
/// re-fetch is logged and the attempt falls back to the last known price
/// rather than aborting the retry. A business "volume minimum not met"
/// reclassifies as dust instead, using whichever price was last fetched.
async fn exit_position(engine: &Engine, mut position: Position, current_price: Decimal, reason: ExitReason) {
    begin_closing(&mut position);
    engine.state.positions.write().await.insert(position.symbol.clone(), position.clone());

    let symbol = position.symbol.clone();
    let quantity = position.quantity;
    let last_known_price = std::cell::Cell::new(current_price);
    let sell_result = retry_with_schedule("market_sell", &SELL_RETRY_SCHEDULE, || {
        let symbol = symbol.clone();
        let last_known_price = &last_known_price;
        async move {
            match engine.exchange.fetch_ticker(&symbol).await {
                Ok(price) => last_known_price.set(price),
                Err(e) => warn!(symbol, error = %e, "could not re-fetch price before this sell attempt; reusing the last known price"),
            }
            engine.exchange.market_sell(&symbol, quantity).await
        }
    })
    .await;
    let current_price = last_known_price.get();

    match sell_result {
        Ok(fill) => {
            engine.state.positions.write().await.remove(&symbol);
            let snapshot = engine.state.snapshot_positions().await;
            if let Err(e) = engine.position_store.save_all(&snapshot).await {
                error!(symbol, error = %e, "failed to persist position removal after exit");
            }
            crate::infrastructure::observability::metrics::open_positions().set(snapshot.len() as i64);

            let pnl_usd = (fill.fill_price - position.entry_price) * position.quantity;
            let pnl_percent = position.profit_percent(fill.fill_price);
            let record = TradeRecord::exit(
                Utc::now(),
                symbol.clone(),
                position.quantity,
                fill.fill_price,
                reason,
                pnl_usd,
                pnl_percent,
                position.strategy,
                fill.order_id,
                position.trade_id,
            );
            if let Err(e) = engine.trade_store.append(&record).await {
                error!(symbol, error = %e, "failed to append exit trade record");
            }
            crate::infrastructure::observability::metrics::trades_total().with_label_values(&["SELL", reason_label(reason)]).inc();
            info!(symbol, reason = ?reason, price = %fill.fill_price, pnl_usd = %pnl_usd, "closed position");
        }
        Err(e) if e.is_volume_minimum_not_met() => {
            warn!(symbol, "exit rejected as below volume minimum; reclassifying as dust");
            purge_as_dust(engine, &position, current_price).await;
        }
        Err(e) => {
            error!(symbol, error = %e, "sell retry schedule exhausted, position remains open for re-evaluation next tick");
            mark_retry_exhausted(&mut position);
            engine.state.positions.write().await.insert(symbol.clone(), position.clone());
            let snapshot = engine.state.snapshot_positions().await;
            if let Err(e) = engine.position_store.save_all(&snapshot).await {
                error!(symbol, error = %e, "failed to persist retry-exhausted position state");
            }
            crate::infrastructure::observability::metrics::exchange_errors_total().with_label_values(&["market_sell", error_kind(&e)]).inc();
        }
    }
}

fn reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::StrategyEntry => "STRATEGY_ENTRY",
        ExitReason::TakeProfit => "TAKE_PROFIT",
        ExitReason::StopLoss => "STOP_LOSS",
        ExitReason::TrailingStop => "TRAILING_STOP",
        ExitReason::StrategyExit => "STRATEGY_EXIT",
        ExitReason::DustPurge => "DUST_PURGE",
        ExitReason::Manual => "MANUAL",
    }
}

fn error_kind(e: &ExchangeError) -> &'static str {
    match e {
        ExchangeError::Transient { .. } => "transient",
        ExchangeError::RateLimited { .. } => "rate_limited",
        ExchangeError::Business { .. } => "business",
        ExchangeError::Timeout { .. } => "timeout",
    }
}
