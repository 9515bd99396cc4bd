use crate::domain::ai::{AIVerdict, AiParameters, ScoreResult};
use crate::domain::strategy::Side;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Weighted-vote aggregation over the four sub-scorers (spec §4.D).
pub struct Aggregator;

impl Aggregator {
    /// `scores` pairs each scorer's name with its weight and result;
    /// `default_parameters` are the per-strategy defaults used when no
    /// scorer proposed autonomous parameters.
    pub fn vote(scores: &[(String, Decimal, ScoreResult)], ai_min_confidence: Decimal, default_parameters: AiParameters) -> AIVerdict {
        let mut buy_score = Decimal::ZERO;
        let mut sell_score = Decimal::ZERO;
        let mut hold_score = Decimal::ZERO;
        let mut per_model = HashMap::with_capacity(scores.len());
        let mut proposed_parameters: Option<AiParameters> = None;

        for (name, weight, result) in scores {
            let weighted = *weight * result.confidence;
            match result.side {
                Side::Buy => buy_score += weighted,
                Side::Sell => sell_score += weighted,
                Side::Hold => hold_score += weighted,
            }
            if let Some(params) = result.proposed_parameters {
                proposed_parameters = Some(params);
            }
            per_model.insert(name.clone(), *result);
        }

        let (side, confidence) = if buy_score >= sell_score && buy_score >= hold_score {
            (Side::Buy, buy_score)
        } else if sell_score >= hold_score {
            (Side::Sell, sell_score)
        } else {
            (Side::Hold, hold_score)
        };

        if side != Side::Buy || confidence < ai_min_confidence {
            return AIVerdict::reject(
                format!("argmax side={side:?} confidence={confidence} below gate ai_min_confidence={ai_min_confidence}"),
                per_model,
            );
        }

        AIVerdict {
            signal: Side::Buy,
            confidence,
            reasoning: "weighted ensemble vote favored BUY above the confidence gate".to_string(),
            parameters: proposed_parameters.unwrap_or(default_parameters),
            per_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn default_params() -> AiParameters {
        AiParameters {
            position_size_percent: dec!(10),
            stop_loss_percent: dec!(2),
            take_profit_percent: dec!(4),
            risk_reward_ratio: dec!(2),
        }
    }

    #[test]
    fn buy_at_exactly_the_confidence_floor_is_accepted() {
        let scores = vec![("technical".to_string(), dec!(1.0), ScoreResult::simple(Side::Buy, dec!(0.55)))];
        let verdict = Aggregator::vote(&scores, dec!(0.55), default_params());
        assert!(verdict.is_buy());
    }

    #[test]
    fn buy_below_the_confidence_floor_is_rejected() {
        let scores = vec![("technical".to_string(), dec!(1.0), ScoreResult::simple(Side::Buy, dec!(0.54)))];
        let verdict = Aggregator::vote(&scores, dec!(0.55), default_params());
        assert!(!verdict.is_buy());
    }

    #[test]
    fn non_buy_argmax_is_rejected_even_above_threshold() {
        let scores = vec![
            ("technical".to_string(), dec!(0.6), ScoreResult::simple(Side::Sell, dec!(0.9))),
            ("sentiment".to_string(), dec!(0.4), ScoreResult::simple(Side::Buy, dec!(0.9))),
        ];
        let verdict = Aggregator::vote(&scores, dec!(0.5), default_params());
        assert!(!verdict.is_buy());
    }

    #[test]
    fn llm_proposed_parameters_propagate_over_defaults() {
        let proposed = AiParameters {
            position_size_percent: dec!(15),
            stop_loss_percent: dec!(1.5),
            take_profit_percent: dec!(4.2),
            risk_reward_ratio: dec!(2.8),
        };
        let scores = vec![(
            "llm".to_string(),
            dec!(1.0),
            ScoreResult {
                side: Side::Buy,
                confidence: dec!(0.72),
                proposed_parameters: Some(proposed),
            },
        )];
        let verdict = Aggregator::vote(&scores, dec!(0.55), default_params());
        assert_eq!(verdict.parameters.position_size_percent, dec!(15));
    }
}
