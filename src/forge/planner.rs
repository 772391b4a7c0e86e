//! Deterministic candidate generation from open gaps (§4.6 Planner).

use sha1::{Digest, Sha1};

use crate::error::ForgeError;
use crate::types::candidate::{CandidateSafety, CandidateStatus, ExecutionClass, SkillCandidate};
use crate::types::gap::{Gap, GapCategory, GapStatus};

const BASE_CONSTRAINTS: &[&str] = &[
    "must not modify files outside the agent workspace",
    "must be reversible via a documented rollback step",
];

const REQUIRED_TESTS: &[&str] = &[
    "unit test covering the primary code path",
    "negative test covering the rejection path",
    "idempotence test for repeated invocation",
];

fn category_constraint(category: GapCategory) -> Option<&'static str> {
    match category {
        GapCategory::Safety => Some("includes a policy-deny regression test"),
        GapCategory::Reliability => Some("includes a timeout/retry resilience test"),
        _ => None,
    }
}

fn candidate_id(gap_id: &str, name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{gap_id}:{name}").as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn build_candidate(gap: &Gap, now_ms: i64) -> Result<SkillCandidate, ForgeError> {
    let name = format!("autonomy-{}", SkillCandidate::slug(&gap.title));
    let mut constraints: Vec<String> = BASE_CONSTRAINTS.iter().map(|s| s.to_string()).collect();
    if let Some(extra) = category_constraint(gap.category) {
        constraints.push(extra.to_string());
    }

    if constraints.is_empty() {
        return Err(ForgeError::MissingSafetyConstraints {
            candidate: name.clone(),
        });
    }

    Ok(SkillCandidate {
        id: candidate_id(&gap.id, &name),
        source_gap_id: gap.id.clone(),
        name: name.clone(),
        intent: format!("Address gap: {}", gap.title),
        status: CandidateStatus::Candidate,
        priority: (gap.score.max(1)),
        created_at: now_ms,
        updated_at: now_ms,
        safety: CandidateSafety {
            execution_class: ExecutionClass::ReversibleWrite,
            constraints,
        },
        tests: REQUIRED_TESTS.iter().map(|s| s.to_string()).collect(),
    })
}

/// Generate up to [`SkillCandidate::MAX_NEW_PER_CALL`] candidates for open
/// gaps not already backing one, merge with `existing`, re-sort, and
/// truncate to the registry cap.
pub fn plan_candidates(
    existing: &[SkillCandidate],
    gaps: &[Gap],
    now_ms: i64,
) -> Result<Vec<SkillCandidate>, ForgeError> {
    let backed: std::collections::HashSet<&str> =
        existing.iter().map(|c| c.source_gap_id.as_str()).collect();

    let mut generated = Vec::new();
    for gap in gaps {
        if gap.status != GapStatus::Open || backed.contains(gap.id.as_str()) {
            continue;
        }
        if generated.len() >= SkillCandidate::MAX_NEW_PER_CALL {
            break;
        }
        generated.push(build_candidate(gap, now_ms)?);
    }

    let mut merged = existing.to_vec();
    merged.extend(generated);
    merged.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    if merged.len() > SkillCandidate::MAX_CANDIDATES {
        merged.truncate(SkillCandidate::MAX_CANDIDATES);
    }
    Ok(merged)
}
