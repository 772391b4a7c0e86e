//! Promotion gate checks before the `promote` stage is allowed to advance (§4.8).

use crate::canary::CanaryStatus;
use crate::types::candidate::CandidateStatus;
use crate::types::state::AgentState;

#[derive(Debug, Clone)]
pub struct PromotionGateConfig {
    pub minimum_recent_cycles: u32,
    pub maximum_error_rate: f64,
    pub minimum_eval_score: f64,
}

impl Default for PromotionGateConfig {
    fn default() -> Self {
        Self {
            minimum_recent_cycles: 3,
            maximum_error_rate: 0.2,
            minimum_eval_score: 0.6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromotionGateResult {
    pub passed: bool,
    pub reason: String,
}

/// Evaluate the promotion gate for the current state and canary status.
pub fn evaluate(
    state: &AgentState,
    canary_status: Option<CanaryStatus>,
    config: &PromotionGateConfig,
) -> PromotionGateResult {
    let verified_count = state
        .augmentation
        .candidates
        .iter()
        .filter(|c| c.status == CandidateStatus::Verified)
        .count();

    if verified_count == 0 {
        return PromotionGateResult {
            passed: false,
            reason: "no verified candidates".to_string(),
        };
    }

    let recent_cycle_count = state.recent_cycles.len() as u32;
    if recent_cycle_count < config.minimum_recent_cycles {
        return PromotionGateResult {
            passed: false,
            reason: format!(
                "recent cycle count {recent_cycle_count} below minimum {}",
                config.minimum_recent_cycles
            ),
        };
    }

    let error_rate = crate::canary::recent_error_rate(state);
    if error_rate > config.maximum_error_rate {
        return PromotionGateResult {
            passed: false,
            reason: format!(
                "error rate {error_rate:.3} exceeds maximum {}",
                config.maximum_error_rate
            ),
        };
    }

    if canary_status == Some(CanaryStatus::Regressed) {
        return PromotionGateResult {
            passed: false,
            reason: "canary status is regressed".to_string(),
        };
    }

    let eval_score = state.augmentation.last_eval_score.unwrap_or(0.0);
    if eval_score < config.minimum_eval_score {
        return PromotionGateResult {
            passed: false,
            reason: format!(
                "eval score {eval_score:.3} below minimum {}",
                config.minimum_eval_score
            ),
        };
    }

    PromotionGateResult {
        passed: true,
        reason: "promotion gate satisfied".to_string(),
    }
}
