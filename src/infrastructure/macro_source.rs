//! Macro data source implementations (spec §4.D #3).

use crate::application::ensemble::macro_scorer::{MacroDataSource, MacroSnapshot};
use crate::domain::errors::AiEnsembleError;
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

const FEAR_GREED_URL: &str = "https://api.alternative.me/fng/?limit=1";

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
}

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    data: Vec<FearGreedEntry>,
}

/// Proxies the Alternative.me Fear & Greed index as a risk-appetite
/// stand-in when no dedicated VIX/DXY/yield/gold feed is wired (spec §4.D
/// #3 names those scalars; this is the pluggable substitute). The index
/// runs 0 (extreme fear) to 100 (extreme greed); it is inverted onto a
/// VIX-like scale so [`classify_regime`] in the scorer module still reads
/// "low value = risk-on".
pub struct AlternativeMeMacroSource {
    client: reqwest::Client,
}

impl Default for AlternativeMeMacroSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AlternativeMeMacroSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MacroDataSource for AlternativeMeMacroSource {
    async fn fetch(&self) -> Result<MacroSnapshot, AiEnsembleError> {
        let resp: FearGreedResponse = self
            .client
            .get(FEAR_GREED_URL)
            .send()
            .await
            .map_err(|e| AiEnsembleError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| AiEnsembleError::Transport(e.to_string()))?;

        let index = resp
            .data
            .first()
            .and_then(|entry| entry.value.parse::<f64>().ok())
            .and_then(Decimal::from_f64)
            .unwrap_or(dec!(50));

        // Extreme greed (100) -> calm-market-equivalent VIX of ~10;
        // extreme fear (0) -> stressed-market-equivalent VIX of ~40.
        let synthetic_vix = dec!(40) - (index * dec!(0.3));

        Ok(MacroSnapshot {
            vix: synthetic_vix,
            dollar_index: dec!(103),
            treasury_10y_yield: dec!(4.2),
            gold: dec!(2400),
        })
    }
}
