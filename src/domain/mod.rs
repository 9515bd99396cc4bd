pub mod ai;
pub mod errors;
pub mod indicators;
pub mod portfolio_context;
pub mod position;
pub mod price_format;
pub mod strategy;
pub mod trade_record;
pub mod types;
pub mod volatility;
