use super::{EnsembleContext, Scorer};
use crate::config::{Config, LlmScorerVariant};
use crate::domain::ai::{AiParameters, ScoreResult};
use crate::domain::errors::AiEnsembleError;
use crate::domain::strategy::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Port over the external language-model HTTP endpoint (spec §6, "AI
/// language-model wire"). `complete` returns the raw `content` text; the
/// schema parsing below belongs to this module, not the transport.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiEnsembleError>;
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    action: String,
    confidence: Decimal,
    #[serde(default)]
    reasoning: String,
    position_size_percent: Decimal,
    stop_loss_percent: Decimal,
    take_profit_percent: Decimal,
    risk_reward_ratio: Decimal,
}

/// Extracts the first balanced `{...}` block from `text`, tolerating
/// surrounding prose (spec §6: "Parsing must tolerate surrounding prose").
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn side_from_action(action: &str) -> Side {
    match action.to_ascii_uppercase().as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        _ => Side::Hold,
    }
}

fn parse_response(raw: &str) -> Result<(ScoreResult, String), AiEnsembleError> {
    let json = extract_json_object(raw).ok_or_else(|| AiEnsembleError::SchemaInvalid("no JSON object found in response".to_string()))?;
    let parsed: RawVerdict = serde_json::from_str(json).map_err(|e| AiEnsembleError::SchemaInvalid(e.to_string()))?;

    let parameters = AiParameters {
        position_size_percent: parsed.position_size_percent,
        stop_loss_percent: parsed.stop_loss_percent,
        take_profit_percent: parsed.take_profit_percent,
        risk_reward_ratio: parsed.risk_reward_ratio,
    }
    .clamped();

    let confidence = (parsed.confidence / dec!(100)).clamp(Decimal::ZERO, Decimal::ONE);

    Ok((
        ScoreResult {
            side: side_from_action(&parsed.action),
            confidence,
            proposed_parameters: Some(parameters),
        },
        parsed.reasoning,
    ))
}

fn build_messages(ctx: &EnsembleContext<'_>, style: PromptStyle) -> (String, String) {
    let system = match style {
        PromptStyle::Standard => {
            "You are a disciplined crypto trading risk validator. Respond with a single JSON object only.".to_string()
        }
        PromptStyle::Debate => {
            "You are moderating a debate between a bullish and a bearish trader on this setup, then rendering a \
             verdict. Respond with a single JSON object only."
                .to_string()
        }
        PromptStyle::ChainOfThought => {
            "Think step by step about this setup before answering, then respond with a single JSON object only."
                .to_string()
        }
    };

    let user = format!(
        "symbol={} price={} rsi14={} macd_line={} macd_signal={} adx14={} volume_ratio={} \
         open_positions={}/{} total_exposure_usd={} volatility_regime={:?}. \
         Respond with JSON: {{\"action\":\"BUY|SELL|HOLD\",\"confidence\":0-100,\"reasoning\":\"...\",\
         \"risks\":[...],\"position_size_percent\":N,\"stop_loss_percent\":N,\"take_profit_percent\":N,\
         \"risk_reward_ratio\":N}}",
        ctx.symbol,
        ctx.current_price,
        ctx.indicators.rsi14,
        ctx.indicators.macd.line,
        ctx.indicators.macd.signal,
        ctx.indicators.adx14,
        ctx.indicators.volume_ratio,
        ctx.portfolio.open_positions_count,
        ctx.portfolio.max_positions,
        ctx.portfolio.total_exposure_usd,
        ctx.volatility.regime,
    );

    (system, user)
}

#[derive(Debug, Clone, Copy)]
enum PromptStyle {
    Standard,
    Debate,
    ChainOfThought,
}

async fn run_validator(backend: &Arc<dyn LlmBackend>, ctx: &EnsembleContext<'_>, style: PromptStyle) -> ScoreResult {
    let (system, user) = build_messages(ctx, style);

    let call = backend.complete(&system, &user);
    let outcome = tokio::time::timeout(LLM_TIMEOUT, call).await;

    match outcome {
        Ok(Ok(raw)) => match parse_response(&raw) {
            Ok((result, _reasoning)) => result,
            Err(e) => {
                warn!(symbol = ctx.symbol, error = %e, "llm response failed schema validation");
                ScoreResult::neutral_hold(Decimal::ZERO)
            }
        },
        Ok(Err(e)) => {
            warn!(symbol = ctx.symbol, error = %e, "llm transport error");
            ScoreResult::neutral_hold(Decimal::ZERO)
        }
        Err(_) => {
            warn!(symbol = ctx.symbol, "llm call timed out after 60s");
            ScoreResult::neutral_hold(Decimal::ZERO)
        }
    }
}

/// The standard language-model validator (spec §4.D #4).
pub struct LlmValidatorScorer {
    backend: Arc<dyn LlmBackend>,
}

impl LlmValidatorScorer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Scorer for LlmValidatorScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.llm
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.llm && config.llm_scorer_variant == LlmScorerVariant::Standard
    }

    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult {
        run_validator(&self.backend, ctx, PromptStyle::Standard).await
    }
}

/// Alternate scorer prompting the model to argue both sides before
/// rendering a verdict (spec §9 Open Question, resolved as a selectable
/// scorer variant). Same wire contract and schema as the standard
/// validator.
pub struct DebateLlmScorer {
    backend: Arc<dyn LlmBackend>,
}

impl DebateLlmScorer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Scorer for DebateLlmScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.llm
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.llm && config.llm_scorer_variant == LlmScorerVariant::Debate
    }

    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult {
        run_validator(&self.backend, ctx, PromptStyle::Debate).await
    }
}

/// Alternate scorer prompting explicit chain-of-thought reasoning before
/// the JSON verdict (spec §9 Open Question).
pub struct ChainOfThoughtLlmScorer {
    backend: Arc<dyn LlmBackend>,
}

impl ChainOfThoughtLlmScorer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Scorer for ChainOfThoughtLlmScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.llm
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.llm && config.llm_scorer_variant == LlmScorerVariant::ChainOfThought
    }

    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult {
        run_validator(&self.backend, ctx, PromptStyle::ChainOfThought).await
    }
}
