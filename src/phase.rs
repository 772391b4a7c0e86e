//! The self-augmentation finite state machine (§4.4).

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::candidate::ExecutionClass;
use crate::types::state::{AgentState, Transition};

/// Stages form a fixed cycle; advancing is only ever to the immediate
/// successor (or a no-op staying put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Design,
    Synthesize,
    Verify,
    Canary,
    Promote,
    Observe,
    Learn,
    Retire,
}

impl Stage {
    /// The immediate successor in the fixed cycle.
    pub fn successor(self) -> Stage {
        match self {
            Stage::Discover => Stage::Design,
            Stage::Design => Stage::Synthesize,
            Stage::Synthesize => Stage::Verify,
            Stage::Verify => Stage::Canary,
            Stage::Canary => Stage::Promote,
            Stage::Promote => Stage::Observe,
            Stage::Observe => Stage::Learn,
            Stage::Learn => Stage::Retire,
            Stage::Retire => Stage::Discover,
        }
    }
}

/// Pure legality check: `to` must be `from` itself or its immediate successor.
pub fn is_legal_transition(from: Stage, to: Stage) -> bool {
    to == from || to == from.successor()
}

/// Blast-radius class for work performed while in a given stage.
pub fn execution_class_for_stage(stage: Stage) -> ExecutionClass {
    match stage {
        Stage::Promote | Stage::Retire => ExecutionClass::Destructive,
        Stage::Synthesize | Stage::Verify | Stage::Canary => ExecutionClass::ReversibleWrite,
        _ => ExecutionClass::ReadOnly,
    }
}

/// `ResolveNextStage` (§4.4 table): the stage the orchestrator should move
/// toward given the current augmentation state, before any policy gate runs.
pub fn resolve_next_stage(state: &AgentState) -> Stage {
    let aug = &state.augmentation;
    match aug.stage {
        Stage::Discover => {
            if aug.gaps.iter().any(|g| g.status == crate::types::gap::GapStatus::Open) {
                Stage::Design
            } else {
                Stage::Discover
            }
        }
        Stage::Design => {
            if has_candidate_or_planned(state) {
                Stage::Synthesize
            } else {
                Stage::Discover
            }
        }
        Stage::Synthesize => {
            if has_candidate_or_planned(state) {
                Stage::Verify
            } else {
                Stage::Discover
            }
        }
        Stage::Verify => {
            if has_verified(state) {
                Stage::Canary
            } else {
                Stage::Discover
            }
        }
        Stage::Canary => {
            if has_verified(state) {
                Stage::Promote
            } else {
                Stage::Discover
            }
        }
        Stage::Promote => Stage::Observe,
        Stage::Observe => Stage::Learn,
        Stage::Learn => Stage::Retire,
        Stage::Retire => Stage::Discover,
    }
}

fn has_candidate_or_planned(state: &AgentState) -> bool {
    state.augmentation.candidates.iter().any(|c| {
        matches!(
            c.status,
            crate::types::candidate::CandidateStatus::Candidate
                | crate::types::candidate::CandidateStatus::Planned
        )
    })
}

fn has_verified(state: &AgentState) -> bool {
    state
        .augmentation
        .candidates
        .iter()
        .any(|c| c.status == crate::types::candidate::CandidateStatus::Verified)
}

/// Mutate `state.augmentation` to move to `to`, appending a transition record.
/// Fails only if the orchestrator itself requests an illegal move — by
/// construction `resolve_next_stage` never proposes one, so this is a bug
/// guard, not an expected-path error.
pub fn transition_stage(
    state: &mut AgentState,
    to: Stage,
    reason: &str,
    now_ms: i64,
) -> Result<(), EngineError> {
    let from = state.augmentation.stage;
    if !is_legal_transition(from, to) {
        return Err(EngineError::IllegalTransition { from, to });
    }
    state.augmentation.stage = to;
    state.augmentation.stage_entered_at = now_ms;
    state.augmentation.last_transition_at = now_ms;
    state.augmentation.last_transition_reason = reason.to_string();
    state.augmentation.push_transition(Transition {
        from,
        to,
        ts: now_ms,
        reason: reason.to_string(),
    });
    Ok(())
}
