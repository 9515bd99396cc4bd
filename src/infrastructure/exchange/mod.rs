//! Exchange Adapter (component A, spec §4.A): a typed wrapper over the
//! spot exchange. No retries live here — that is the Trading Engine's job
//! (§4.E); this layer only translates wire responses into typed results
//! or a classified [`ExchangeError`].

pub mod binance;
pub mod mock;

use crate::domain::errors::ExchangeError;
use crate::domain::types::{BuyFill, Candle, SellFill};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal, ExchangeError>;
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError>;
    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>, ExchangeError>;
    async fn market_buy(&self, symbol: &str, quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError>;
    async fn market_sell(&self, symbol: &str, base_quantity: Decimal) -> Result<SellFill, ExchangeError>;
}
