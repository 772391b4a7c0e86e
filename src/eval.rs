//! Long-horizon scenario-pack evaluation (§4.9).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedEffect {
    Improve,
    Degrade,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStep {
    #[serde(rename = "type")]
    pub step_type: String,
    pub expected: ExpectedEffect,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone)]
pub struct EvalInputs {
    pub verified_candidates: u32,
    pub recent_error_rate: f64,
    pub blocked_tasks: u32,
}

fn clip(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

fn scenario_score(scenario: &Scenario, inputs: &EvalInputs) -> f64 {
    let base = clip(
        0.65 + (0.06 * inputs.verified_candidates as f64).min(0.25)
            - (0.7 * inputs.recent_error_rate).min(0.35)
            - (0.02 * inputs.blocked_tasks as f64).min(0.2),
        0.0,
        1.0,
    );

    let mut score = base;
    for step in &scenario.steps {
        let delta = match step.expected {
            ExpectedEffect::Improve => 0.03 * step.weight,
            ExpectedEffect::Degrade => -0.03 * step.weight,
            ExpectedEffect::Neutral => 0.005 * step.weight,
        };
        score = clip(score + delta, 0.0, 1.0);
    }
    score
}

/// Default three-scenario pack: baseline, adversarial, regression.
pub fn default_scenario_pack() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "baseline".to_string(),
            steps: vec![
                ScenarioStep {
                    step_type: "routine_discovery".into(),
                    expected: ExpectedEffect::Improve,
                    weight: 1.0,
                },
                ScenarioStep {
                    step_type: "routine_promotion".into(),
                    expected: ExpectedEffect::Neutral,
                    weight: 1.0,
                },
            ],
        },
        Scenario {
            name: "adversarial".to_string(),
            steps: vec![
                ScenarioStep {
                    step_type: "malformed_event_flood".into(),
                    expected: ExpectedEffect::Neutral,
                    weight: 1.5,
                },
                ScenarioStep {
                    step_type: "policy_bypass_attempt".into(),
                    expected: ExpectedEffect::Degrade,
                    weight: 2.0,
                },
            ],
        },
        Scenario {
            name: "regression".to_string(),
            steps: vec![
                ScenarioStep {
                    step_type: "latency_spike".into(),
                    expected: ExpectedEffect::Degrade,
                    weight: 1.0,
                },
                ScenarioStep {
                    step_type: "rollback_recovery".into(),
                    expected: ExpectedEffect::Improve,
                    weight: 1.0,
                },
            ],
        },
    ]
}

/// Mean score across the scenario pack, the value stored as
/// `augmentation.lastEvalScore` during the `promote` stage.
pub fn run_eval(pack: &[Scenario], inputs: &EvalInputs) -> f64 {
    if pack.is_empty() {
        return 0.0;
    }
    let sum: f64 = pack.iter().map(|s| scenario_score(s, inputs)).sum();
    sum / pack.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pack_has_at_least_three_scenarios() {
        assert!(default_scenario_pack().len() >= 3);
    }

    #[test]
    fn run_eval_is_clipped_to_unit_interval() {
        let pack = default_scenario_pack();
        let inputs = EvalInputs {
            verified_candidates: 100,
            recent_error_rate: 0.0,
            blocked_tasks: 0,
        };
        let score = run_eval(&pack, &inputs);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn high_error_rate_lowers_score() {
        let pack = default_scenario_pack();
        let healthy = run_eval(
            &pack,
            &EvalInputs {
                verified_candidates: 1,
                recent_error_rate: 0.0,
                blocked_tasks: 0,
            },
        );
        let unhealthy = run_eval(
            &pack,
            &EvalInputs {
                verified_candidates: 1,
                recent_error_rate: 0.5,
                blocked_tasks: 0,
            },
        );
        assert!(unhealthy < healthy);
    }
}
