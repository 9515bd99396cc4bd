//! End-to-end scenarios (spec §8 "Concrete end-to-end scenarios (seed the
//! test suite)"), driven directly against the entry/monitor pipelines with
//! the in-memory mock exchange.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spotrader::application::engine::{entry, monitor, Engine};
use spotrader::application::ensemble::{EnsembleContext, Scorer};
use spotrader::config::{Config, ConfigHandle, PairConfig};
use spotrader::domain::ai::{AiParameters, ScoreResult};
use spotrader::domain::errors::ExchangeError;
use spotrader::domain::position::Position;
use spotrader::domain::price_format::format_price;
use spotrader::domain::strategy::{Side, StrategyKind};
use spotrader::domain::trade_record::ExitReason;
use spotrader::domain::types::{BuyFill, Candle, SellFill};
use spotrader::infrastructure::exchange::mock::MockExchange;
use spotrader::infrastructure::exchange::ExchangeAdapter;
use spotrader::infrastructure::persistence::position_store::PositionStore;
use spotrader::infrastructure::persistence::trade_store::TradeStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Always votes BUY with a fixed confidence and a fixed set of proposed
/// parameters, standing in for the language-model scorer in scenario 1.
struct FixedBuyScorer {
    confidence: Decimal,
    parameters: AiParameters,
}

#[async_trait]
impl Scorer for FixedBuyScorer {
    fn name(&self) -> &'static str {
        "fixed"
    }
    fn weight(&self, _config: &Config) -> Decimal {
        dec!(1.0)
    }
    fn enabled(&self, _config: &Config) -> bool {
        true
    }
    async fn analyze(&self, _ctx: &EnsembleContext<'_>) -> ScoreResult {
        ScoreResult {
            side: Side::Buy,
            confidence: self.confidence,
            proposed_parameters: Some(self.parameters),
        }
    }
}

/// Wraps a `MockExchange`, recording the quote amount of the most recent
/// `market_buy` call so the test can assert the exact sizing computation.
struct RecordingExchange {
    inner: MockExchange,
    last_buy_amount: Mutex<Option<Decimal>>,
}

#[async_trait]
impl ExchangeAdapter for RecordingExchange {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.inner.fetch_ticker(symbol).await
    }
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        self.inner.fetch_ohlcv(symbol, timeframe, limit).await
    }
    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>, ExchangeError> {
        self.inner.fetch_balance().await
    }
    async fn market_buy(&self, symbol: &str, quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError> {
        *self.last_buy_amount.lock().unwrap() = Some(quote_amount_usd);
        self.inner.market_buy(symbol, quote_amount_usd).await
    }
    async fn market_sell(&self, symbol: &str, base_quantity: Decimal) -> Result<SellFill, ExchangeError> {
        self.inner.market_sell(symbol, base_quantity).await
    }
}

/// Wraps a `MockExchange`, failing every `market_sell` call with a
/// transient error regardless of how many times it is called — used for
/// the exit-retry-exhaustion scenario, where `MockExchange`'s one-shot
/// `arm_next_order_failure` is not enough.
struct AlwaysFailingSellExchange {
    inner: MockExchange,
    sell_attempts: Mutex<u32>,
}

#[async_trait]
impl ExchangeAdapter for AlwaysFailingSellExchange {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.inner.fetch_ticker(symbol).await
    }
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        self.inner.fetch_ohlcv(symbol, timeframe, limit).await
    }
    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>, ExchangeError> {
        self.inner.fetch_balance().await
    }
    async fn market_buy(&self, symbol: &str, quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError> {
        self.inner.market_buy(symbol, quote_amount_usd).await
    }
    async fn market_sell(&self, _symbol: &str, _base_quantity: Decimal) -> Result<SellFill, ExchangeError> {
        *self.sell_attempts.lock().unwrap() += 1;
        Err(ExchangeError::Transient {
            op: "market_sell".to_string(),
            reason: "connection reset".to_string(),
        })
    }
}

fn momentum_candles() -> Vec<Candle> {
    let base = Utc::now();
    let mut closes = vec![dec!(100); 15];
    closes.extend([dec!(100.3), dec!(100.3), dec!(100.3), dec!(100.3), dec!(100.35)]);
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| Candle {
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100),
            timestamp: base + ChronoDuration::minutes(i as i64),
        })
        .collect()
}

fn momentum_pair(symbol: &str, allocation_percent: Decimal) -> PairConfig {
    PairConfig {
        symbol: symbol.to_string(),
        enabled: true,
        allocation_percent,
        strategies: vec![StrategyKind::Momentum],
    }
}

fn base_config(pairs: Vec<PairConfig>) -> Config {
    let mut config = Config::default();
    config.ai_ensemble_enabled = true;
    config.ai_min_confidence = dec!(0.55);
    config.max_order_size_usd = dec!(500);
    config.min_order_value_usd = dec!(1.00);
    config.pairs = pairs;
    config
}

#[tokio::test]
async fn happy_path_momentum_entry_sizes_and_opens_a_position() {
    let dir = tempdir().unwrap();
    let exchange = Arc::new(RecordingExchange {
        inner: MockExchange::new(),
        last_buy_amount: Mutex::new(None),
    });
    exchange.inner.set_price("BTCUSD", dec!(100.35));
    exchange.inner.set_candles("BTCUSD", momentum_candles());
    exchange.inner.set_balance("USD", dec!(1000));

    let pair = momentum_pair("BTCUSD", dec!(50));
    let config = base_config(vec![pair.clone()]);
    let config_handle = ConfigHandle::new(config);

    let scorer: Arc<dyn Scorer> = Arc::new(FixedBuyScorer {
        confidence: dec!(0.72),
        parameters: AiParameters {
            position_size_percent: dec!(15),
            stop_loss_percent: dec!(1.5),
            take_profit_percent: dec!(4.2),
            risk_reward_ratio: dec!(2.8),
        },
    });

    let engine = Engine::bootstrap(
        config_handle,
        exchange.clone(),
        vec![scorer],
        Arc::new(PositionStore::new(dir.path().join("positions.json"))),
        Arc::new(TradeStore::new(dir.path().join("trades.jsonl"))),
    )
    .await
    .unwrap();

    entry::run(&pair, &engine).await;

    assert_eq!(*exchange.last_buy_amount.lock().unwrap(), Some(dec!(150)));

    let positions = engine.state.snapshot_positions().await;
    assert_eq!(positions.len(), 1);
    let position = &positions[0];
    assert_eq!(position.ai_stop_loss_percent, dec!(1.5));
    assert_eq!(position.ai_take_profit_percent, dec!(4.2));
    assert_eq!(position.ai_position_size_percent, dec!(15));

    let trades = engine.trade_store.recent(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].reason, ExitReason::StrategyEntry);
}

#[tokio::test]
async fn dust_purge_removes_the_position_without_a_sell_order() {
    let dir = tempdir().unwrap();
    let position_store = Arc::new(PositionStore::new(dir.path().join("positions.json")));
    let trade_store = Arc::new(TradeStore::new(dir.path().join("trades.jsonl")));

    let position = Position::new(
        "PUMPUSD".to_string(),
        dec!(0.001),
        dec!(0.00488),
        Utc::now(),
        StrategyKind::Momentum,
        dec!(10),
        dec!(2),
        dec!(4),
        dec!(2),
    );
    position_store.save_all(&[position]).await.unwrap();

    let exchange = Arc::new(MockExchange::new());
    exchange.set_price("PUMPUSD", dec!(0.00000477));
    exchange.set_balance("PUMP", dec!(0.001));

    let config = base_config(vec![PairConfig {
        symbol: "PUMPUSD".to_string(),
        enabled: true,
        allocation_percent: dec!(50),
        strategies: vec![StrategyKind::Momentum],
    }]);

    let engine = Engine::bootstrap(ConfigHandle::new(config), exchange, vec![], position_store, trade_store)
        .await
        .unwrap();

    monitor::run("PUMPUSD", &engine).await;

    assert!(engine.state.positions.read().await.get("PUMPUSD").is_none());
    let trades = engine.trade_store.recent(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].reason, ExitReason::DustPurge);
}

#[tokio::test]
async fn ai_disabled_refuses_to_buy_even_with_a_firing_strategy() {
    let dir = tempdir().unwrap();
    let exchange = Arc::new(MockExchange::new());
    exchange.set_price("SOLUSD", dec!(100));
    exchange.set_candles("SOLUSD", momentum_candles());
    exchange.set_balance("USD", dec!(1000));

    let pair = momentum_pair("SOLUSD", dec!(50));
    let mut config = base_config(vec![pair.clone()]);
    config.ai_ensemble_enabled = false;
    let engine = Engine::bootstrap(
        ConfigHandle::new(config),
        exchange,
        vec![],
        Arc::new(PositionStore::new(dir.path().join("positions.json"))),
        Arc::new(TradeStore::new(dir.path().join("trades.jsonl"))),
    )
    .await
    .unwrap();

    entry::run(&pair, &engine).await;

    assert!(engine.state.snapshot_positions().await.is_empty());
    assert!(engine.trade_store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn trailing_stop_exits_a_swing_winner_after_arming() {
    let dir = tempdir().unwrap();
    let position_store = Arc::new(PositionStore::new(dir.path().join("positions.json")));
    let trade_store = Arc::new(TradeStore::new(dir.path().join("trades.jsonl")));

    // A wide take-profit (15%, the configured ceiling) keeps the ordinary
    // take-profit check from firing at the +10% mark, so the trailing
    // stop is what exits this position, matching the scenario's intent.
    let position = Position::new(
        "BTCUSD".to_string(),
        dec!(1),
        dec!(100),
        Utc::now(),
        StrategyKind::MacdSupertrend,
        dec!(10),
        dec!(2.5),
        dec!(15),
        dec!(2),
    );
    position_store.save_all(&[position]).await.unwrap();

    let exchange = Arc::new(MockExchange::new());
    exchange.set_balance("BTC", dec!(1));
    let config = base_config(vec![PairConfig {
        symbol: "BTCUSD".to_string(),
        enabled: true,
        allocation_percent: dec!(50),
        strategies: vec![StrategyKind::MacdSupertrend],
    }]);
    let engine = Engine::bootstrap(ConfigHandle::new(config), exchange.clone(), vec![], position_store, trade_store)
        .await
        .unwrap();

    // Price runs up to $110: arms the trailing stop, no exit yet.
    exchange.set_price("BTCUSD", dec!(110));
    monitor::run("BTCUSD", &engine).await;
    {
        let positions = engine.state.positions.read().await;
        let position = positions.get("BTCUSD").expect("still open after arming");
        assert!(position.trailing_stop_armed);
        assert_eq!(position.highest_price_seen, dec!(110));
    }
    assert!(engine.trade_store.recent(10).await.unwrap().is_empty());

    // Price retreats to the trailing stop ($110 * 0.97 = $106.70): exits.
    exchange.set_price("BTCUSD", dec!(106.70));
    monitor::run("BTCUSD", &engine).await;

    assert!(engine.state.positions.read().await.get("BTCUSD").is_none());
    let trades = engine.trade_store.recent(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].reason, ExitReason::TrailingStop);
}

#[tokio::test(start_paused = true)]
async fn exit_retry_exhaustion_leaves_the_position_open_for_the_next_tick() {
    let dir = tempdir().unwrap();
    let position_store = Arc::new(PositionStore::new(dir.path().join("positions.json")));
    let trade_store = Arc::new(TradeStore::new(dir.path().join("trades.jsonl")));

    let position = Position::new(
        "BTCUSD".to_string(),
        dec!(1),
        dec!(100),
        Utc::now(),
        StrategyKind::Momentum,
        dec!(10),
        dec!(2),
        dec!(4),
        dec!(2),
    );
    position_store.save_all(&[position]).await.unwrap();

    let exchange = Arc::new(AlwaysFailingSellExchange {
        inner: MockExchange::new(),
        sell_attempts: Mutex::new(0),
    });
    exchange.inner.set_price("BTCUSD", dec!(105)); // +5% clears the 4% take-profit.
    exchange.inner.set_balance("BTC", dec!(1));

    let config = base_config(vec![PairConfig {
        symbol: "BTCUSD".to_string(),
        enabled: true,
        allocation_percent: dec!(50),
        strategies: vec![StrategyKind::Momentum],
    }]);
    let engine = Arc::new(
        Engine::bootstrap(ConfigHandle::new(config), exchange.clone(), vec![], position_store, trade_store)
            .await
            .unwrap(),
    );

    let engine_for_task = Arc::clone(&engine);
    let handle = tokio::spawn(async move { monitor::run("BTCUSD", &engine_for_task).await });
    tokio::time::advance(std::time::Duration::from_secs(60)).await;
    handle.await.unwrap();

    assert_eq!(*exchange.sell_attempts.lock().unwrap(), 5);
    let positions = engine.state.positions.read().await;
    let position = positions.get("BTCUSD").expect("retry exhaustion reverts to OPEN, stays in memory");
    assert_eq!(position.status, spotrader::domain::position::PositionStatus::Open);
    assert!(position.closing_retry_exhausted);
}

#[test]
fn low_priced_token_still_shows_a_significant_digit() {
    assert_eq!(format_price(dec!(0.0000004)), "$0.00000040");
}
