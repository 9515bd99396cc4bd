//! Entry pipeline (spec §4.E "Entry pipeline (per symbol)"): the ten-step
//! gate chain that turns a configured pair into, at most, one new
//! `Position` per tick.

use super::retry::{retry_with_schedule, BUY_RETRY_SCHEDULE};
use super::Engine;
use crate::application::ensemble::{Aggregator, EnsembleContext};
use crate::application::strategies::{Evaluator, StrategyContext};
use crate::config::PairConfig;
use crate::domain::ai::AiParameters;
use crate::domain::indicators::{self, MacdCrossoverTracker};
use crate::domain::portfolio_context::PortfolioContext;
use crate::domain::position::Position;
use crate::domain::strategy::Side;
use crate::domain::trade_record::TradeRecord;
use crate::domain::volatility;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{error, info, warn};

const CANDLE_LIMIT: usize = 100;
const CANDLE_TIMEFRAME: &str = "1h";
const QUOTE_ASSETS: [&str; 3] = ["USDT", "USDC", "USD"];

fn free_quote_balance(balances: &HashMap<String, Decimal>) -> Decimal {
    QUOTE_ASSETS
        .iter()
        .find_map(|asset| balances.get(*asset))
        .copied()
        .unwrap_or(Decimal::ZERO)
}

/// Runs the full entry pipeline for one configured pair. Never panics on
/// a gate miss or exchange error — every failure path logs and returns.
pub async fn run(pair: &PairConfig, engine: &Engine) {
    let _serialization = engine.state.lock_for(&pair.symbol).lock().await;
    let config = engine.config.current().await;

    // 1. Global gate.
    if !config.ai_ensemble_enabled {
        return;
    }

    // Position already open on this symbol: nothing to enter.
    if engine.state.positions.read().await.contains_key(&pair.symbol) {
        return;
    }

    // 2. Count gate.
    let positions = engine.state.snapshot_positions().await;
    if positions.len() >= config.max_total_positions {
        return;
    }

    let candles = match engine.exchange.fetch_ohlcv(&pair.symbol, CANDLE_TIMEFRAME, CANDLE_LIMIT).await {
        Ok(c) => c,
        Err(e) => {
            warn!(symbol = %pair.symbol, error = %e, "entry: could not fetch candles, skipping this tick");
            return;
        }
    };
    if candles.is_empty() {
        return;
    }

    let now = Utc::now();
    let mut crossover_trackers = engine.state.crossover_trackers.lock().await;
    let tracker = crossover_trackers.entry(pair.symbol.clone()).or_insert_with(MacdCrossoverTracker::new);
    let computed_indicators = indicators::compute(&candles, tracker, now);
    drop(crossover_trackers);

    // 3. Strategy gate.
    let evaluator = Evaluator::new(pair.strategies.clone());
    let strategy_ctx = StrategyContext {
        current_price: computed_indicators.current_price,
        indicators: &computed_indicators,
        position: None,
        min_hold_minutes: 0,
        now,
    };
    let signal = evaluator.entry_candidate(&strategy_ctx);
    if signal.side != Side::Buy {
        return;
    }

    // 4. Per-strategy cap.
    let per_strategy_cap = config.max_positions_per_strategy.get(&signal.strategy).copied().unwrap_or(usize::MAX);
    let per_strategy_counts: HashMap<_, _> = positions
        .iter()
        .fold(HashMap::new(), |mut acc, p| {
            *acc.entry(p.strategy).or_insert(0usize) += 1;
            acc
        });
    if per_strategy_counts.get(&signal.strategy).copied().unwrap_or(0) >= per_strategy_cap {
        return;
    }

    // 5. PortfolioContext and VolatilityMetrics snapshots.
    let total_exposure_usd: Decimal = positions.iter().map(|p| p.notional(p.entry_price)).sum();
    let portfolio = PortfolioContext {
        open_positions_count: positions.len(),
        max_positions: config.max_total_positions,
        per_strategy_counts,
        total_exposure_usd,
        daily_pnl_usd: Decimal::ZERO,
        symbols_held: positions.iter().map(|p| p.symbol.clone()).collect(),
    };
    let volatility_metrics = volatility::compute(
        computed_indicators.atr14,
        computed_indicators.current_price,
        volatility::avg_range_percent(&candles, 20),
    );

    let recent_trades = match engine.trade_store.recent(20).await {
        Ok(trades) => trades.into_iter().filter(|t| t.symbol == pair.symbol).collect::<Vec<_>>(),
        Err(e) => {
            warn!(symbol = %pair.symbol, error = %e, "could not load recent trade history for ensemble context");
            Vec::new()
        }
    };

    let ensemble_ctx = EnsembleContext {
        symbol: &pair.symbol,
        current_price: computed_indicators.current_price,
        candles: &candles,
        indicators: &computed_indicators,
        portfolio: &portfolio,
        volatility: &volatility_metrics,
        recent_trades: &recent_trades,
        config: &config,
    };

    // 6. AI Ensemble.
    let mut scores = Vec::with_capacity(engine.scorers.len());
    let futures = engine
        .scorers
        .iter()
        .filter(|scorer| scorer.enabled(&config))
        .map(|scorer| async {
            let result = scorer.analyze(&ensemble_ctx).await;
            (scorer.name().to_string(), scorer.weight(&config), result)
        });
    for (name, weight, result) in futures::future::join_all(futures).await {
        scores.push((name, weight, result));
    }

    let strategy_risk = config.strategies.get(&signal.strategy).copied();
    let default_parameters = AiParameters {
        position_size_percent: strategy_risk.map(|s| s.position_size_percent).unwrap_or(crate::domain::position::DEFAULT_POSITION_SIZE_PERCENT),
        stop_loss_percent: strategy_risk.map(|s| s.stop_loss_percent).unwrap_or(crate::domain::position::DEFAULT_STOP_LOSS_PERCENT),
        take_profit_percent: strategy_risk.map(|s| s.take_profit_percent).unwrap_or(crate::domain::position::DEFAULT_TAKE_PROFIT_PERCENT),
        risk_reward_ratio: crate::domain::position::DEFAULT_RISK_REWARD_RATIO,
    };
    let verdict = Aggregator::vote(&scores, config.ai_min_confidence, default_parameters);
    if !verdict.is_buy() {
        return;
    }
    let parameters = verdict.parameters.clamped();

    // 7. Quote amount.
    let balances = match engine.exchange.fetch_balance().await {
        Ok(b) => b,
        Err(e) => {
            warn!(symbol = %pair.symbol, error = %e, "entry: could not fetch balance, skipping this tick");
            return;
        }
    };
    let free_usd = free_quote_balance(&balances);
    let quote_amount = (free_usd * parameters.position_size_percent / Decimal::from(100))
        .min(config.max_order_size_usd)
        .min(free_usd * pair.allocation_percent / Decimal::from(100));

    // 8. Dust floor.
    if quote_amount < config.min_order_value_usd {
        return;
    }

    // 9. Exposure gate.
    if total_exposure_usd + quote_amount > config.max_total_exposure_usd {
        return;
    }

    // 10. Execute with retry.
    let symbol = pair.symbol.clone();
    let buy_result = retry_with_schedule("market_buy", &BUY_RETRY_SCHEDULE, || {
        let symbol = symbol.clone();
        async move { engine.exchange.market_buy(&symbol, quote_amount).await }
    })
    .await;

    match buy_result {
        Ok(fill) => {
            let position = Position::new(
                pair.symbol.clone(),
                fill.filled_quantity,
                fill.fill_price,
                now,
                signal.strategy,
                parameters.position_size_percent,
                parameters.stop_loss_percent,
                parameters.take_profit_percent,
                parameters.risk_reward_ratio,
            );
            engine.state.positions.write().await.insert(pair.symbol.clone(), position.clone());
            let snapshot = engine.state.snapshot_positions().await;
            if let Err(e) = engine.position_store.save_all(&snapshot).await {
                error!(symbol = %pair.symbol, error = %e, "failed to persist new position");
            }
            crate::infrastructure::observability::metrics::open_positions().set(snapshot.len() as i64);

            let record = TradeRecord::entry(now, pair.symbol.clone(), fill.filled_quantity, fill.fill_price, signal.strategy, verdict.confidence, fill.order_id, position.trade_id);
            if let Err(e) = engine.trade_store.append(&record).await {
                error!(symbol = %pair.symbol, error = %e, "failed to append BUY trade record");
            }
            crate::infrastructure::observability::metrics::trades_total().with_label_values(&["BUY", "STRATEGY_ENTRY"]).inc();
            info!(symbol = %pair.symbol, strategy = %signal.strategy, price = %fill.fill_price, quantity = %fill.filled_quantity, "opened position");
        }
        Err(e) => {
            error!(symbol = %pair.symbol, error = %e, "buy retry schedule exhausted, not opening a position");
            crate::infrastructure::observability::metrics::exchange_errors_total().with_label_values(&["market_buy", error_kind(&e)]).inc();
        }
    }
}

fn error_kind(e: &crate::domain::errors::ExchangeError) -> &'static str {
    use crate::domain::errors::ExchangeError::*;
    match e {
        Transient { .. } => "transient",
        RateLimited { .. } => "rate_limited",
        Business { .. } => "business",
        Timeout { .. } => "timeout",
    }
}
