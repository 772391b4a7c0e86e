//! Canary health evaluation and rollback/promotion notes (§4.7).

use crate::types::candidate::CandidateStatus;
use crate::types::state::{AgentState, CycleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryStatus {
    Healthy,
    Regressed,
}

#[derive(Debug, Clone)]
pub struct CanaryInput {
    pub error_rate: f64,
    pub max_error_rate: f64,
    pub latency_p95_ms: f64,
    pub baseline_latency_p95_ms: f64,
    pub max_latency_regression_pct: f64,
}

#[derive(Debug, Clone)]
pub struct CanaryResult {
    pub status: CanaryStatus,
    pub reason: String,
    pub should_rollback: bool,
}

fn clamp_nonneg(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        0.0
    }
}

/// Evaluate canary health from explicit inputs.
pub fn evaluate(input: &CanaryInput) -> CanaryResult {
    let error_rate = clamp_nonneg(input.error_rate);
    let max_error_rate = clamp_nonneg(input.max_error_rate);
    let latency_p95 = clamp_nonneg(input.latency_p95_ms);
    let baseline = clamp_nonneg(input.baseline_latency_p95_ms);
    let max_regression_pct = clamp_nonneg(input.max_latency_regression_pct);

    if error_rate > max_error_rate {
        return CanaryResult {
            status: CanaryStatus::Regressed,
            reason: format!("error rate {error_rate} exceeds threshold {max_error_rate}"),
            should_rollback: true,
        };
    }

    if baseline > 0.0 {
        let regression_pct = (latency_p95 - baseline) / baseline * 100.0;
        if regression_pct > max_regression_pct {
            return CanaryResult {
                status: CanaryStatus::Regressed,
                reason: format!(
                    "p95 latency regressed {regression_pct:.1}% versus baseline, exceeding {max_regression_pct}%"
                ),
                should_rollback: true,
            };
        }
    }

    CanaryResult {
        status: CanaryStatus::Healthy,
        reason: "within error-rate and latency-regression thresholds".to_string(),
        should_rollback: false,
    }
}

/// The last 5 non-skipped cycles, most recent first.
fn recent_cycle_window(state: &AgentState) -> Vec<&crate::types::state::CycleRecord> {
    state
        .recent_cycles
        .iter()
        .rev()
        .filter(|c| c.status != CycleStatus::Skipped)
        .take(5)
        .collect()
}

/// Error rate over the last 5 non-skipped cycles (0.0 if there are none).
///
/// This is the recency-scoped rate the promotion gate and eval scoring both
/// need; `state.metrics.ok`/`state.metrics.error` are lifetime-cumulative and
/// unsuitable here since they never reset.
pub fn recent_error_rate(state: &AgentState) -> f64 {
    let recent = recent_cycle_window(state);
    if recent.is_empty() {
        return 0.0;
    }
    let errors = recent.iter().filter(|c| c.status == CycleStatus::Error).count();
    errors as f64 / recent.len() as f64
}

/// Derive canary inputs from the last 5 non-skipped cycles when explicit
/// metrics are not supplied.
pub fn derive_from_recent_cycles(
    state: &AgentState,
    max_error_rate: f64,
    max_latency_regression_pct: f64,
) -> CanaryInput {
    let recent = recent_cycle_window(state);

    if recent.is_empty() {
        return CanaryInput {
            error_rate: 0.0,
            max_error_rate,
            latency_p95_ms: 0.0,
            baseline_latency_p95_ms: 0.0,
            max_latency_regression_pct,
        };
    }

    let error_rate = recent_error_rate(state);

    let mut durations: Vec<u64> = recent.iter().map(|c| c.duration_ms).collect();
    durations.sort_unstable();
    let p95_index = ((durations.len() as f64) * 0.95).ceil() as usize;
    let p95_index = p95_index.saturating_sub(1).min(durations.len() - 1);
    let latency_p95 = durations[p95_index] as f64;

    let baseline = median(&durations);

    CanaryInput {
        error_rate,
        max_error_rate,
        latency_p95_ms: latency_p95,
        baseline_latency_p95_ms: baseline,
        max_latency_regression_pct,
    }
}

fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Apply a regression: demote every `verified` candidate to `rejected`.
pub fn rollback_verified_candidates(state: &mut AgentState) {
    for candidate in state.augmentation.candidates.iter_mut() {
        if candidate.status == CandidateStatus::Verified {
            candidate.status = CandidateStatus::Rejected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_exceedance_is_regressed_and_rolls_back() {
        let input = CanaryInput {
            error_rate: 0.5,
            max_error_rate: 0.1,
            latency_p95_ms: 100.0,
            baseline_latency_p95_ms: 100.0,
            max_latency_regression_pct: 50.0,
        };
        let result = evaluate(&input);
        assert_eq!(result.status, CanaryStatus::Regressed);
        assert!(result.should_rollback);
    }

    #[test]
    fn latency_regression_beyond_threshold_is_regressed() {
        let input = CanaryInput {
            error_rate: 0.0,
            max_error_rate: 0.1,
            latency_p95_ms: 200.0,
            baseline_latency_p95_ms: 100.0,
            max_latency_regression_pct: 50.0,
        };
        let result = evaluate(&input);
        assert_eq!(result.status, CanaryStatus::Regressed);
    }

    #[test]
    fn within_thresholds_is_healthy() {
        let input = CanaryInput {
            error_rate: 0.0,
            max_error_rate: 0.1,
            latency_p95_ms: 110.0,
            baseline_latency_p95_ms: 100.0,
            max_latency_regression_pct: 50.0,
        };
        let result = evaluate(&input);
        assert_eq!(result.status, CanaryStatus::Healthy);
        assert!(!result.should_rollback);
    }

    #[test]
    fn nonfinite_and_negative_inputs_clamp_to_zero() {
        let input = CanaryInput {
            error_rate: f64::NAN,
            max_error_rate: -5.0,
            latency_p95_ms: -10.0,
            baseline_latency_p95_ms: 0.0,
            max_latency_regression_pct: 50.0,
        };
        let result = evaluate(&input);
        assert_eq!(result.status, CanaryStatus::Healthy);
    }
}
