use super::{EnsembleContext, Scorer};
use crate::config::Config;
use crate::domain::ai::ScoreResult;
use crate::domain::errors::AiEnsembleError;
use crate::domain::strategy::Side;
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::warn;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Port for fetching recent headline/social text for a symbol. The real
/// implementation (an RSS feed) lives in infrastructure; tests and the
/// neutral-fallback path never need it to succeed.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>, AiEnsembleError>;
}

/// Consumes a headline feed and runs it through VADER sentiment (spec
/// §4.D #1). Falls back to neutral `HOLD,0.5` whenever the feed is
/// unavailable, rather than failing the whole ensemble call.
pub struct SentimentScorer {
    source: Arc<dyn HeadlineSource>,
}

impl SentimentScorer {
    pub fn new(source: Arc<dyn HeadlineSource>) -> Self {
        Self { source }
    }

    fn score_headlines(&self, headlines: &[String]) -> ScoreResult {
        if headlines.is_empty() {
            return ScoreResult::neutral_hold(dec!(0.5));
        }

        let analyzer = SentimentIntensityAnalyzer::new();
        let mut total_compound = 0.0f64;
        for headline in headlines {
            let scores = analyzer.polarity_scores(headline);
            total_compound += scores.get("compound").copied().unwrap_or(0.0);
        }
        let avg_compound = total_compound / headlines.len() as f64;

        let side = if avg_compound > 0.05 {
            Side::Buy
        } else if avg_compound < -0.05 {
            Side::Sell
        } else {
            Side::Hold
        };
        let confidence = Decimal::from_f64(avg_compound.abs().min(1.0)).unwrap_or(dec!(0.5));
        ScoreResult::simple(side, confidence)
    }
}

#[async_trait]
impl Scorer for SentimentScorer {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn weight(&self, config: &Config) -> Decimal {
        config.ai_weights.sentiment
    }

    fn enabled(&self, config: &Config) -> bool {
        config.ai_model_enabled.sentiment
    }

    async fn analyze(&self, ctx: &EnsembleContext<'_>) -> ScoreResult {
        match self.source.fetch_headlines(ctx.symbol).await {
            Ok(headlines) => self.score_headlines(&headlines),
            Err(e) => {
                warn!(symbol = ctx.symbol, error = %e, "headline feed unavailable, falling back to neutral sentiment");
                ScoreResult::neutral_hold(dec!(0.5))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl HeadlineSource for FailingSource {
        async fn fetch_headlines(&self, _symbol: &str) -> Result<Vec<String>, AiEnsembleError> {
            Err(AiEnsembleError::Transport("feed down".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_back_to_neutral_when_feed_unavailable() {
        let scorer = SentimentScorer::new(Arc::new(FailingSource));
        let result = scorer.score_headlines(&[]);
        assert_eq!(result.side, Side::Hold);
        assert_eq!(result.confidence, dec!(0.5));
    }

    #[test]
    fn positive_headlines_score_as_buy() {
        let scorer = SentimentScorer::new(Arc::new(FailingSourceUnused));
        let headlines = vec![
            "Bitcoin surges to new highs amid strong institutional demand".to_string(),
            "Analysts bullish as rally continues".to_string(),
        ];
        let result = scorer.score_headlines(&headlines);
        assert_eq!(result.side, Side::Buy);
    }

    struct FailingSourceUnused;

    #[async_trait]
    impl HeadlineSource for FailingSourceUnused {
        async fn fetch_headlines(&self, _symbol: &str) -> Result<Vec<String>, AiEnsembleError> {
            Ok(Vec::new())
        }
    }
}
