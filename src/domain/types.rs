use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single OHLCV bar. Immutable; a finite ordered sequence per (symbol, timeframe)
/// is newest-last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Result of a filled market buy, as returned by the Exchange Adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyFill {
    pub order_id: String,
    pub filled_quantity: Decimal,
    pub fill_price: Decimal,
}

/// Result of a filled market sell, as returned by the Exchange Adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellFill {
    pub order_id: String,
    pub fill_price: Decimal,
}
