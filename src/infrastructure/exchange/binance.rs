use super::ExchangeAdapter;
use crate::domain::errors::ExchangeError;
use crate::domain::types::{BuyFill, Candle, SellFill};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// HMAC-SHA256-signed REST client (spec §6 "Exchange wire"). Market orders
/// are submitted in quote currency (USD notional) for buys and base
/// currency (asset units) for sells.
pub struct BinanceExchange {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BinanceExchange {
    pub fn new(base_url: String, api_key: String, api_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with this config");
        Self {
            client,
            base_url,
            api_key,
            api_secret,
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes()).expect("HMAC accepts a key of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn classify_transport_error(op: &str, err: reqwest::Error) -> ExchangeError {
        if err.is_timeout() {
            ExchangeError::Timeout {
                op: op.to_string(),
                timeout_secs: CALL_TIMEOUT.as_secs(),
            }
        } else {
            ExchangeError::Transient {
                op: op.to_string(),
                reason: err.to_string(),
            }
        }
    }

    fn classify_business_error(op: &str, status: reqwest::StatusCode, body: &ApiErrorBody) -> ExchangeError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ExchangeError::RateLimited {
                op: op.to_string(),
                reason: body.msg.clone(),
            }
        } else {
            ExchangeError::Business {
                op: op.to_string(),
                code: body.code.to_string(),
                message: body.msg.clone(),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "orderId")]
    order_id: i64,
    #[serde(rename = "executedQty")]
    executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty")]
    cumulative_quote_qty: Decimal,
}

#[async_trait]
impl ExchangeAdapter for BinanceExchange {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error("fetch_ticker", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: ApiErrorBody = resp.json().await.unwrap_or(ApiErrorBody {
                code: -1,
                msg: "unknown error body".to_string(),
            });
            return Err(Self::classify_business_error("fetch_ticker", status, &body));
        }

        let parsed: TickerResponse = resp.json().await.map_err(|e| ExchangeError::Transient {
            op: "fetch_ticker".to_string(),
            reason: e.to_string(),
        })?;
        Ok(parsed.price)
    }

    async fn fetch_ohlcv(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, timeframe, limit
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error("fetch_ohlcv", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: ApiErrorBody = resp.json().await.unwrap_or(ApiErrorBody {
                code: -1,
                msg: "unknown error body".to_string(),
            });
            return Err(Self::classify_business_error("fetch_ohlcv", status, &body));
        }

        let raw: Vec<(i64, Decimal, Decimal, Decimal, Decimal, Decimal, serde_json::Value)> =
            resp.json().await.map_err(|e| ExchangeError::Transient {
                op: "fetch_ohlcv".to_string(),
                reason: e.to_string(),
            })?;

        Ok(raw
            .into_iter()
            .map(|(open_time, open, high, low, close, volume, _)| Candle {
                open,
                high,
                low,
                close,
                volume,
                timestamp: Utc.timestamp_millis_opt(open_time).single().unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis();
        let query = format!("timestamp={timestamp}");
        let signature = self.sign(&query);
        let url = format!("{}/api/v3/account?{}&signature={}", self.base_url, query, signature);

        let resp = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error("fetch_balance", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: ApiErrorBody = resp.json().await.unwrap_or(ApiErrorBody {
                code: -1,
                msg: "unknown error body".to_string(),
            });
            return Err(Self::classify_business_error("fetch_balance", status, &body));
        }

        let parsed: AccountResponse = resp.json().await.map_err(|e| ExchangeError::Transient {
            op: "fetch_balance".to_string(),
            reason: e.to_string(),
        })?;

        Ok(parsed.balances.into_iter().map(|b| (b.asset, b.free)).collect())
    }

    async fn market_buy(&self, symbol: &str, quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis();
        let query = format!("symbol={symbol}&side=BUY&type=MARKET&quoteOrderQty={quote_amount_usd}&timestamp={timestamp}");
        let signature = self.sign(&query);
        let url = format!("{}/api/v3/order?{}&signature={}", self.base_url, query, signature);

        let resp = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error("market_buy", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: ApiErrorBody = resp.json().await.unwrap_or(ApiErrorBody {
                code: -1,
                msg: "unknown error body".to_string(),
            });
            return Err(Self::classify_business_error("market_buy", status, &body));
        }

        let parsed: OrderResponse = resp.json().await.map_err(|e| ExchangeError::Transient {
            op: "market_buy".to_string(),
            reason: e.to_string(),
        })?;

        let fill_price = if parsed.executed_qty.is_zero() {
            Decimal::ZERO
        } else {
            parsed.cumulative_quote_qty / parsed.executed_qty
        };

        Ok(BuyFill {
            order_id: parsed.order_id.to_string(),
            filled_quantity: parsed.executed_qty,
            fill_price,
        })
    }

    async fn market_sell(&self, symbol: &str, base_quantity: Decimal) -> Result<SellFill, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis();
        let query = format!("symbol={symbol}&side=SELL&type=MARKET&quantity={base_quantity}&timestamp={timestamp}");
        let signature = self.sign(&query);
        let url = format!("{}/api/v3/order?{}&signature={}", self.base_url, query, signature);

        let resp = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error("market_sell", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: ApiErrorBody = resp.json().await.unwrap_or(ApiErrorBody {
                code: -1,
                msg: "unknown error body".to_string(),
            });
            return Err(Self::classify_business_error("market_sell", status, &body));
        }

        let parsed: OrderResponse = resp.json().await.map_err(|e| ExchangeError::Transient {
            op: "market_sell".to_string(),
            reason: e.to_string(),
        })?;

        let fill_price = if parsed.executed_qty.is_zero() {
            Decimal::ZERO
        } else {
            parsed.cumulative_quote_qty / parsed.executed_qty
        };

        Ok(SellFill {
            order_id: parsed.order_id.to_string(),
            fill_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_query_strings_deterministically() {
        let exchange = BinanceExchange::new(
            "https://api.example.com".to_string(),
            "key".to_string(),
            "secret".to_string(),
        );
        let sig1 = exchange.sign("symbol=BTCUSDT&timestamp=1");
        let sig2 = exchange.sign("symbol=BTCUSDT&timestamp=1");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64); // hex-encoded SHA256
    }
}
