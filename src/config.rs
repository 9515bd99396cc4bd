//! Config loading, validation, and hot reload (spec §3/§6/§9).
//!
//! Loaded once at startup from a TOML file, re-validated on every reload,
//! and installed as a new immutable snapshot under `ConfigHandle` so that
//! in-flight tick work keeps running against the config it started with
//! (read-copy-update, spec §5).

use crate::domain::errors::ConfigError;
use crate::domain::strategy::StrategyKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiWeights {
    pub sentiment: Decimal,
    pub technical: Decimal,
    pub macro_: Decimal,
    pub llm: Decimal,
}

impl AiWeights {
    pub fn sum(&self) -> Decimal {
        self.sentiment + self.technical + self.macro_ + self.llm
    }
}

impl Default for AiWeights {
    fn default() -> Self {
        Self {
            sentiment: dec!(0.20),
            technical: dec!(0.35),
            macro_: dec!(0.15),
            llm: dec!(0.30),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiModelEnabled {
    pub sentiment: bool,
    pub technical: bool,
    pub macro_: bool,
    pub llm: bool,
}

impl Default for AiModelEnabled {
    fn default() -> Self {
        Self {
            sentiment: true,
            technical: true,
            macro_: true,
            llm: true,
        }
    }
}

/// Selects which language-model scorer implementation is active (spec §9
/// Open Question: debate/chain-of-thought variants are wired but inactive
/// by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmScorerVariant {
    #[default]
    Standard,
    Debate,
    ChainOfThought,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    pub enabled: bool,
    pub activation_percent: Decimal,
    pub distance_percent: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategyRiskConfig {
    pub stop_loss_percent: Decimal,
    pub take_profit_percent: Decimal,
    pub position_size_percent: Decimal,
    pub min_hold_minutes: i64,
    pub trailing_stop: TrailingStopConfig,
}

fn default_strategy_table() -> HashMap<StrategyKind, StrategyRiskConfig> {
    let mut m = HashMap::new();
    m.insert(
        StrategyKind::Scalping,
        StrategyRiskConfig {
            stop_loss_percent: dec!(1.0),
            take_profit_percent: dec!(1.5),
            position_size_percent: dec!(10),
            min_hold_minutes: 3,
            trailing_stop: TrailingStopConfig {
                enabled: false,
                activation_percent: dec!(5.0),
                distance_percent: dec!(3.0),
            },
        },
    );
    m.insert(
        StrategyKind::Momentum,
        StrategyRiskConfig {
            stop_loss_percent: dec!(2.0),
            take_profit_percent: dec!(4.0),
            position_size_percent: dec!(10),
            min_hold_minutes: 8,
            trailing_stop: TrailingStopConfig {
                enabled: false,
                activation_percent: dec!(5.0),
                distance_percent: dec!(3.0),
            },
        },
    );
    m.insert(
        StrategyKind::MeanReversion,
        StrategyRiskConfig {
            stop_loss_percent: dec!(2.0),
            take_profit_percent: dec!(2.5),
            position_size_percent: dec!(10),
            min_hold_minutes: 5,
            trailing_stop: TrailingStopConfig {
                enabled: false,
                activation_percent: dec!(5.0),
                distance_percent: dec!(3.0),
            },
        },
    );
    m.insert(
        StrategyKind::MacdSupertrend,
        StrategyRiskConfig {
            stop_loss_percent: dec!(2.5),
            take_profit_percent: dec!(8.0),
            position_size_percent: dec!(10),
            min_hold_minutes: 60,
            trailing_stop: TrailingStopConfig {
                enabled: true,
                activation_percent: dec!(5.0),
                distance_percent: dec!(3.0),
            },
        },
    );
    m
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub symbol: String,
    pub enabled: bool,
    pub allocation_percent: Decimal,
    pub strategies: Vec<StrategyKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ai_ensemble_enabled: bool,
    pub ai_min_confidence: Decimal,
    pub ai_weights: AiWeights,
    pub ai_model_enabled: AiModelEnabled,
    pub llm_scorer_variant: LlmScorerVariant,

    pub max_total_positions: usize,
    pub max_positions_per_strategy: HashMap<StrategyKind, usize>,
    pub max_order_size_usd: Decimal,
    pub max_total_exposure_usd: Decimal,
    pub min_order_value_usd: Decimal,

    /// Reserved hook point (spec §9 Open Question): parsed and validated,
    /// never consulted by the exit monitor.
    pub profit_protection_threshold_percent: Decimal,

    #[serde(default = "default_strategy_table")]
    pub strategies: HashMap<StrategyKind, StrategyRiskConfig>,
    pub pairs: Vec<PairConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut max_positions_per_strategy = HashMap::new();
        max_positions_per_strategy.insert(StrategyKind::Scalping, 3);
        max_positions_per_strategy.insert(StrategyKind::Momentum, 3);
        max_positions_per_strategy.insert(StrategyKind::MeanReversion, 3);
        max_positions_per_strategy.insert(StrategyKind::MacdSupertrend, 2);

        Self {
            ai_ensemble_enabled: true,
            ai_min_confidence: dec!(0.55),
            ai_weights: AiWeights::default(),
            ai_model_enabled: AiModelEnabled::default(),
            llm_scorer_variant: LlmScorerVariant::default(),
            max_total_positions: 10,
            max_positions_per_strategy,
            max_order_size_usd: dec!(500),
            max_total_exposure_usd: dec!(5000),
            min_order_value_usd: dec!(1.00),
            profit_protection_threshold_percent: dec!(0.0),
            strategies: default_strategy_table(),
            pairs: Vec::new(),
        }
    }
}

/// Top-level keys `Config` actually deserializes. Anything else found in a
/// loaded TOML document is unknown and gets a `warn!`, per spec §9.
const KNOWN_TOP_LEVEL_FIELDS: &[&str] = &[
    "ai_ensemble_enabled",
    "ai_min_confidence",
    "ai_weights",
    "ai_model_enabled",
    "llm_scorer_variant",
    "max_total_positions",
    "max_positions_per_strategy",
    "max_order_size_usd",
    "max_total_exposure_usd",
    "min_order_value_usd",
    "profit_protection_threshold_percent",
    "strategies",
    "pairs",
];

fn warn_on_unknown_top_level_fields(raw: &str) {
    let Ok(toml::Value::Table(table)) = raw.parse::<toml::Value>() else {
        return;
    };
    for key in table.keys() {
        if !KNOWN_TOP_LEVEL_FIELDS.contains(&key.as_str()) {
            warn!(field = %key, "unknown config field ignored");
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        warn_on_unknown_top_level_fields(raw);
        let config: Config = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Structural validation; this is what can fail a load. Unknown top-level
    /// fields are handled separately in [`from_toml_str`](Self::from_toml_str)
    /// — they warn but never fail (spec §9).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.ai_weights.sum();
        let tolerance = dec!(0.001);
        if (sum - dec!(1.0)).abs() > tolerance {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }

        if !(dec!(0)..=dec!(1)).contains(&self.ai_min_confidence) {
            return Err(ConfigError::InvalidField {
                field: "ai_min_confidence".to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }

        for pair in &self.pairs {
            for strategy in &pair.strategies {
                if !self.strategies.contains_key(strategy) {
                    return Err(ConfigError::UnknownStrategy(strategy.to_string()));
                }
            }
        }

        if self.min_order_value_usd <= Decimal::ZERO {
            return Err(ConfigError::InvalidField {
                field: "min_order_value_usd".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Read-copy-update snapshot. `current()` returns a cheap `Arc` clone; a
/// reload swaps in a fresh snapshot without disturbing readers already
/// holding the old one.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<Config>>>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub async fn current(&self) -> Arc<Config> {
        self.inner.read().await.clone()
    }

    /// Validates `new_config` before installing it. On failure the previous
    /// snapshot remains in effect and the caller is expected to log loudly
    /// (spec §7: "Refuse to load; keep previous config; log loudly").
    pub async fn update(&self, new_config: Config) -> Result<(), ConfigError> {
        new_config.validate()?;
        let mut guard = self.inner.write().await;
        *guard = Arc::new(new_config);
        Ok(())
    }

    pub async fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        match Config::load(path) {
            Ok(config) => {
                self.update(config).await?;
                info!(path = %path.display(), "config reloaded");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config reload rejected, keeping previous snapshot");
                Err(e)
            }
        }
    }
}
