//! Crash-recovery reconciliation (spec §4.E "Crash recovery"): compares
//! the persisted position snapshot against live exchange balances on
//! startup. Deliberately conservative — an asset the exchange holds that
//! we have no record of is acknowledged, never adopted as a position
//! (spec §9 Open Question).

use crate::domain::errors::ExchangeError;
use crate::domain::position::Position;
use crate::domain::trade_record::{ExitReason, TradeRecord};
use crate::infrastructure::exchange::ExchangeAdapter;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;

const QUOTE_SUFFIXES: [&str; 3] = ["USDT", "USDC", "USD"];

/// Strips a recognized quote-currency suffix from a trading symbol
/// (e.g. "BTCUSD" -> "BTC"). Symbols with no recognized suffix are
/// returned unchanged.
pub fn base_asset(symbol: &str) -> &str {
    for suffix in QUOTE_SUFFIXES {
        if let Some(stripped) = symbol.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    symbol
}

pub struct ReconciliationOutcome {
    /// Exchange assets with a nonzero free balance that do not back any
    /// persisted position (spec §9: surfaced, never auto-ingested).
    pub untracked_assets: Vec<String>,
    /// Persisted positions whose backing asset has vanished from the
    /// exchange; closed here with reason MANUAL and an unknown-loss
    /// marker (`pnl_usd`/`pnl_percent` left `None`).
    pub closed_as_manual: Vec<(Position, TradeRecord)>,
    /// Positions that still reconcile cleanly and remain open.
    pub retained: Vec<Position>,
}

pub async fn reconcile(exchange: &dyn ExchangeAdapter, positions: Vec<Position>) -> Result<ReconciliationOutcome, ExchangeError> {
    let balances = exchange.fetch_balance().await?;
    let held_assets: HashMap<&str, Decimal> = balances
        .iter()
        .filter(|(_, amount)| **amount > Decimal::ZERO)
        .map(|(asset, amount)| (asset.as_str(), *amount))
        .collect();

    let mut retained = Vec::new();
    let mut closed_as_manual = Vec::new();
    let mut backed_assets = Vec::new();

    for position in positions {
        let asset = base_asset(&position.symbol);
        if held_assets.contains_key(asset) {
            backed_assets.push(asset.to_string());
            retained.push(position);
        } else {
            let mut record = TradeRecord::exit(
                Utc::now(),
                position.symbol.clone(),
                position.quantity,
                position.entry_price,
                ExitReason::Manual,
                Decimal::ZERO,
                Decimal::ZERO,
                position.strategy,
                "reconciliation-manual-close".to_string(),
                position.trade_id,
            );
            // Unknown-loss marker (spec §4.E): the exchange no longer
            // shows this asset, so realized P&L cannot be computed.
            record.pnl_usd = None;
            record.pnl_percent = None;
            closed_as_manual.push((position, record));
        }
    }

    let untracked_assets = held_assets
        .keys()
        .filter(|asset| !backed_assets.iter().any(|b| b == *asset))
        .map(|asset| asset.to_string())
        .collect();

    Ok(ReconciliationOutcome {
        untracked_assets,
        closed_as_manual,
        retained,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::StrategyKind;
    use crate::domain::types::{BuyFill, Candle, SellFill};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;

    struct FixedBalanceExchange {
        balances: StdHashMap<String, Decimal>,
    }

    #[async_trait]
    impl ExchangeAdapter for FixedBalanceExchange {
        async fn fetch_ticker(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
            unimplemented!()
        }
        async fn fetch_ohlcv(&self, _symbol: &str, _timeframe: &str, _limit: usize) -> Result<Vec<Candle>, ExchangeError> {
            unimplemented!()
        }
        async fn fetch_balance(&self) -> Result<StdHashMap<String, Decimal>, ExchangeError> {
            Ok(self.balances.clone())
        }
        async fn market_buy(&self, _symbol: &str, _quote_amount_usd: Decimal) -> Result<BuyFill, ExchangeError> {
            unimplemented!()
        }
        async fn market_sell(&self, _symbol: &str, _base_quantity: Decimal) -> Result<SellFill, ExchangeError> {
            unimplemented!()
        }
    }

    fn sample_position(symbol: &str) -> Position {
        Position::new(
            symbol.to_string(),
            dec!(0.01),
            dec!(100),
            Utc::now(),
            StrategyKind::Momentum,
            dec!(10),
            dec!(2),
            dec!(4),
            dec!(2),
        )
    }

    #[test]
    fn strips_known_quote_suffixes() {
        assert_eq!(base_asset("BTCUSDT"), "BTC");
        assert_eq!(base_asset("ETHUSD"), "ETH");
        assert_eq!(base_asset("SOLUSDC"), "SOL");
        assert_eq!(base_asset("WEIRD"), "WEIRD");
    }

    #[tokio::test]
    async fn vanished_asset_closes_the_position_as_manual_with_unknown_pnl() {
        let exchange = FixedBalanceExchange { balances: StdHashMap::new() };
        let outcome = reconcile(&exchange, vec![sample_position("BTCUSD")]).await.unwrap();
        assert!(outcome.retained.is_empty());
        assert_eq!(outcome.closed_as_manual.len(), 1);
        let (_, record) = &outcome.closed_as_manual[0];
        assert_eq!(record.reason, ExitReason::Manual);
        assert!(record.pnl_usd.is_none());
    }

    #[tokio::test]
    async fn backed_position_is_retained() {
        let mut balances = StdHashMap::new();
        balances.insert("BTC".to_string(), dec!(0.01));
        let exchange = FixedBalanceExchange { balances };
        let outcome = reconcile(&exchange, vec![sample_position("BTCUSD")]).await.unwrap();
        assert_eq!(outcome.retained.len(), 1);
        assert!(outcome.closed_as_manual.is_empty());
    }

    #[tokio::test]
    async fn held_asset_with_no_position_is_reported_untracked_not_adopted() {
        let mut balances = StdHashMap::new();
        balances.insert("DOGE".to_string(), dec!(1000));
        let exchange = FixedBalanceExchange { balances };
        let outcome = reconcile(&exchange, vec![]).await.unwrap();
        assert_eq!(outcome.untracked_assets, vec!["DOGE".to_string()]);
        assert!(outcome.retained.is_empty());
    }
}
