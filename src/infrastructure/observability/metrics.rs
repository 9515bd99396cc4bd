//! Ambient engine metrics, push-based (no HTTP exposition server in this
//! crate — a future dashboard process, per spec §6, can scrape or pull
//! these through `Registry::gather()` if wired in).

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::OnceLock;

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static OPEN_POSITIONS: OnceLock<IntGauge> = OnceLock::new();
static TICKS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static TICKS_SKIPPED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
static TRADES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static EXCHANGE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

pub fn open_positions() -> &'static IntGauge {
    OPEN_POSITIONS.get_or_init(|| {
        let gauge = IntGauge::new("spotrader_open_positions", "Currently open positions").unwrap();
        registry().register(Box::new(gauge.clone())).unwrap();
        gauge
    })
}

pub fn ticks_total() -> &'static IntCounter {
    TICKS_TOTAL.get_or_init(|| {
        let counter = IntCounter::new("spotrader_ticks_total", "Ticks completed").unwrap();
        registry().register(Box::new(counter.clone())).unwrap();
        counter
    })
}

pub fn ticks_skipped_total() -> &'static IntCounter {
    TICKS_SKIPPED_TOTAL.get_or_init(|| {
        let counter = IntCounter::new(
            "spotrader_ticks_skipped_total",
            "Ticks skipped because the prior tick's work had not drained",
        )
        .unwrap();
        registry().register(Box::new(counter.clone())).unwrap();
        counter
    })
}

pub fn trades_total() -> &'static IntCounterVec {
    TRADES_TOTAL.get_or_init(|| {
        let counter = IntCounterVec::new(
            Opts::new("spotrader_trades_total", "Trades recorded, by action and reason"),
            &["action", "reason"],
        )
        .unwrap();
        registry().register(Box::new(counter.clone())).unwrap();
        counter
    })
}

pub fn exchange_errors_total() -> &'static IntCounterVec {
    EXCHANGE_ERRORS_TOTAL.get_or_init(|| {
        let counter = IntCounterVec::new(
            Opts::new("spotrader_exchange_errors_total", "Exchange adapter errors, by op and kind"),
            &["op", "kind"],
        )
        .unwrap();
        registry().register(Box::new(counter.clone())).unwrap();
        counter
    })
}
