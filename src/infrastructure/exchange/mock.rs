use super::ExchangeAdapter;
use crate::domain::errors::ExchangeError;
use crate::domain::types::{BuyFill, Candle, SellFill};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory stand-in for tests (spec §4.A). Prices and balances are
/// injected by the test; orders always fill at the configured price
/// unless `fail_next_order` is armed.
pub struct MockExchange {
    prices: Mutex<HashMap<String, Decimal>>,
    candles: Mutex<HashMap<String, Vec<Candle>>>,
    balances: Mutex<HashMap<String, Decimal>>,
    fail_next_order: Mutex<Option<ExchangeError>>,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            candles: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            fail_next_order: Mutex::new(None),
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles.lock().unwrap().insert(symbol.to_string(), candles);
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances.lock().unwrap().insert(asset.to_string(), amount);
    }

    pub fn arm_next_order_failure(&self, err: ExchangeError) {
        *self.fail_next_order.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl ExchangeAdapter for MockExchange {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.prices.lock().unwrap().get(symbol).copied().ok_or_else(|| ExchangeError::Business {
            op: "fetch_ticker".to_string(),
            code: "UNKNOWN_SYMBOL".to_string(),
            message: format!("no price configured for {symbol}"),
        })
    }

    async fn fetch_ohlcv(&self, symbol: &str, _timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        let candles = self.candles.lock().unwrap().get(symbol).cloned().unwrap_or_default();
        Ok(candles.into_iter().rev().take(limit).rev().collect())
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>, ExchangeError> {
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn market_buy(&self, symbol: &str, quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError> {
        if let Some(err) = self.fail_next_order.lock().unwrap().take() {
            return Err(err);
        }
        let price = self.fetch_ticker(symbol).await?;
        if price.is_zero() {
            return Err(ExchangeError::Business {
                op: "market_buy".to_string(),
                code: "VOLUME_MIN_NOT_MET".to_string(),
                message: "price is zero".to_string(),
            });
        }
        Ok(BuyFill {
            order_id: Uuid::new_v4().to_string(),
            filled_quantity: quote_amount_usd / price,
            fill_price: price,
        })
    }

    async fn market_sell(&self, symbol: &str, _base_quantity: Decimal) -> Result<SellFill, ExchangeError> {
        if let Some(err) = self.fail_next_order.lock().unwrap().take() {
            return Err(err);
        }
        let price = self.fetch_ticker(symbol).await.unwrap_or(dec!(0));
        Ok(SellFill {
            order_id: Uuid::new_v4().to_string(),
            fill_price: price,
        })
    }
}
