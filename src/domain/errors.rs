use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the Exchange Adapter (§4.A). The adapter performs no
/// retries itself; the `kind` is what lets the Trading Engine's retry policy
/// (§4.E) decide whether to retry, re-sign, or give up.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transient network error calling {op}: {reason}")]
    Transient { op: String, reason: String },

    #[error("rate limited calling {op}: {reason}")]
    RateLimited { op: String, reason: String },

    #[error("exchange business error calling {op}: {code} {message}")]
    Business {
        op: String,
        code: String,
        message: String,
    },

    #[error("call to {op} timed out after {timeout_secs}s")]
    Timeout { op: String, timeout_secs: u64 },
}

impl ExchangeError {
    /// The terminal business error named in spec §4.E/§7: never retried,
    /// reclassifies the position as dust instead.
    pub fn is_volume_minimum_not_met(&self) -> bool {
        matches!(self, ExchangeError::Business { code, .. } if code == "VOLUME_MIN_NOT_MET")
    }

    /// Retryable per the §7 taxonomy: transient network and retryable
    /// business errors (e.g. "invalid nonce") both get the exponential
    /// backoff treatment; only a non-retryable business error does not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Transient { .. }
            | ExchangeError::RateLimited { .. }
            | ExchangeError::Timeout { .. } => true,
            ExchangeError::Business { code, .. } => code != "VOLUME_MIN_NOT_MET",
        }
    }
}

/// Errors from the AI Ensemble (§4.D). A parse/schema failure never aborts
/// the tick; it degrades to a `HOLD,0.0` verdict at the call site.
#[derive(Debug, Error)]
pub enum AiEnsembleError {
    #[error("language-model call timed out after {0}s")]
    Timeout(u64),

    #[error("language-model response failed JSON schema validation: {0}")]
    SchemaInvalid(String),

    #[error("language-model http transport error: {0}")]
    Transport(String),
}

/// Errors from the Persistence layer (§4.F). Logged at CRITICAL; the engine
/// keeps running on in-memory state and retries the write on the next
/// mutation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to atomically write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("record for {symbol} failed invariant validation on load: {reason}")]
    InvariantViolation { symbol: String, reason: String },
}

/// Errors from Config loading/validation (§7). An invalid config is refused
/// wholesale; the previous snapshot remains in effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("ai_weights must sum to 1.0 (±0.001), got {sum}")]
    WeightsDoNotSumToOne { sum: Decimal },

    #[error("unknown strategy referenced in pair config: {0}")]
    UnknownStrategy(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}
