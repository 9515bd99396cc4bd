use super::{EnsembleContext, Scorer};
use crate::config::Config;
use crate::domain::ai::ScoreResult;
use crate::domain::errors::AiEnsembleError;
use crate::domain::strategy::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroRegime {
    Bull,
    Bear,
    Neutral,
}

/// External macro scalars (spec §4.D #3). Values are on their native
/// scales (VIX points, dollar-index points, yield percent, gold USD); the
/// scorer only cares about direction relative to neutral thresholds.
#[derive(Debug, Clone, Copy)]
pub struct MacroSnapshot {
    pub vix: Decimal,
    pub dollar_index: Decimal,
    pub treasury_10y_yield: Decimal,
    pub gold: Decimal,
}

/// Port for a macro data provider. The concrete implementation proxies an
/// external Fear & Greed style feed as a risk-appetite stand-in when no
/// dedicated VIX/DXY/yield/gold feed is wired.
#[async_trait]
pub trait MacroDataSource: Send + Sync {
    async fn fetch(&self) -> Result<MacroSnapshot, AiEnsembleError>;
}

/// Returns a fixed neutral snapshot; used in tests and whenever no real
/// macro feed is configured.
pub struct StubMacroSource;

#[async_trait]
impl MacroDataSource for StubMacroSource {
    async fn fetch(&self) -> Result<MacroSnapshot, AiEnsembleError> {
        Ok(MacroSnapshot {
            vix: dec!(18),
            dollar_index: dec!(103),
            treasury_10y_yield: dec!(4.2),
            gold: dec!(2400),
        })
    }
}

fn classify_regime(snapshot: &MacroSnapshot) -> (MacroRegime, Decimal) {
    // Risk-appetite proxy: low VIX + weak dollar => risk-on; high VIX
    // => risk-off. Thresholds are not named by spec.md and are chosen
    // in line with conventional VIX bands (sub-20 calm, above-28 stressed).
    if snapshot.vix < dec!(20) {
        (MacroRegime::Bull, dec!(0.7))
    } else if snapshot.vix > dec!(28) {
        (MacroRegime::Bear, dec!(0.2))
    } else {
        (MacroRegime::Neutral, dec!(0.5))
    }
}

pub struct MacroScorer {
    source: Arc<dyn MacroDataSource>,
}

impl MacroScorer {
    pub fn new(source: Arc<dyn MacroDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Scorer for MacroScorer {
    fn name(&self) -> &'static str {
        "macro"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.macro_
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.macro_
    }

    async fn analyze(&self, _ctx: &EnsembleContext<'_>) -> ScoreResult {
        match self.source.fetch().await {
            Ok(snapshot) => {
                let (regime, risk_appetite) = classify_regime(&snapshot);
                let side = match regime {
                    MacroRegime::Bull => Side::Buy,
                    MacroRegime::Bear => Side::Sell,
                    MacroRegime::Neutral => Side::Hold,
                };
                ScoreResult::simple(side, risk_appetite)
            }
            Err(e) => {
                warn!(error = %e, "macro data source unavailable, falling back to neutral");
                ScoreResult::neutral_hold(dec!(0.5))
            }
        }
    }
}
