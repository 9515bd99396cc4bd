//! Headless entrypoint (spec §6/§9: no dashboard HTTP surface — that is
//! explicitly out of scope; this binary is the Trading Engine process
//! only). Wires config, exchange adapter, persistence, the four AI
//! Ensemble scorers, and the engine's tick loop together.

use spotrader::application::ensemble::llm::{ChainOfThoughtLlmScorer, DebateLlmScorer, LlmValidatorScorer};
use spotrader::application::ensemble::macro_scorer::MacroScorer;
use spotrader::application::ensemble::sentiment::SentimentScorer;
use spotrader::application::ensemble::technical::TechnicalScorer;
use spotrader::application::ensemble::Scorer;
use spotrader::application::engine::Engine;
use spotrader::config::{Config, ConfigHandle};
use spotrader::infrastructure::exchange::binance::BinanceExchange;
use spotrader::infrastructure::exchange::mock::MockExchange;
use spotrader::infrastructure::exchange::ExchangeAdapter;
use spotrader::infrastructure::llm_client::HttpLlmBackend;
use spotrader::infrastructure::macro_source::AlternativeMeMacroSource;
use spotrader::infrastructure::persistence::position_store::PositionStore;
use spotrader::infrastructure::persistence::trade_store::TradeStore;
use spotrader::infrastructure::sentiment::news::RssHeadlineSource;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn feed_url_for(symbol: &str) -> String {
    format!("https://news.google.com/rss/search?q={symbol}+crypto")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config_path = std::env::var("SPOTRADER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!(path = %config_path, error = %e, "could not load config file, starting from defaults");
        Config::default()
    });
    let config_handle = ConfigHandle::new(config);

    let exchange: Arc<dyn ExchangeAdapter> = if let (Ok(key), Ok(secret), Ok(base_url)) = (
        std::env::var("BINANCE_API_KEY"),
        std::env::var("BINANCE_API_SECRET"),
        std::env::var("BINANCE_BASE_URL"),
    ) {
        Arc::new(BinanceExchange::new(base_url, key, secret))
    } else {
        info!("no exchange credentials in the environment, running against the in-memory mock exchange");
        Arc::new(MockExchange::new())
    };

    let position_store = Arc::new(PositionStore::new(std::env::var("SPOTRADER_POSITIONS_PATH").unwrap_or_else(|_| "positions.json".to_string())));
    let trade_store = Arc::new(TradeStore::new(std::env::var("SPOTRADER_TRADES_PATH").unwrap_or_else(|_| "trades.jsonl".to_string())));

    let llm_backend = Arc::new(HttpLlmBackend::new(
        std::env::var("LLM_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
        std::env::var("LLM_API_KEY").unwrap_or_default(),
        std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
    ));

    // All three LLM scorer variants are registered; `enabled()` gates them
    // on `config.llm_scorer_variant` so exactly one runs per call, and
    // hot-reloading the variant takes effect without restarting.
    let scorers: Vec<Arc<dyn Scorer>> = vec![
        Arc::new(SentimentScorer::new(Arc::new(RssHeadlineSource::new(feed_url_for, 20)))),
        Arc::new(TechnicalScorer),
        Arc::new(MacroScorer::new(Arc::new(AlternativeMeMacroSource::new()))),
        Arc::new(LlmValidatorScorer::new(llm_backend.clone())),
        Arc::new(DebateLlmScorer::new(llm_backend.clone())),
        Arc::new(ChainOfThoughtLlmScorer::new(llm_backend)),
    ];

    let engine = Arc::new(
        Engine::bootstrap(config_handle, exchange, scorers, position_store, trade_store)
            .await
            .map_err(|e| {
                error!(error = %e, "engine bootstrap failed");
                e
            })?,
    );

    let run_handle = tokio::spawn(Arc::clone(&engine).run());

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
    engine.handle().stop();
    let _ = run_handle.await;
    Ok(())
}
