//! Skill candidates produced by the Skill Forge planner (§4.7).

use serde::{Deserialize, Serialize};

/// Lifecycle of a skill candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Candidate,
    Planned,
    Verified,
    Rejected,
}

/// Blast-radius class assigned to a candidate's execution, mirrored by the
/// stage's own `ExecutionClassForStage` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionClass {
    ReadOnly,
    ReversibleWrite,
    Destructive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSafety {
    pub execution_class: ExecutionClass,
    pub constraints: Vec<String>,
}

/// A proposed skill linked to one gap, moving candidate -> planned -> verified/rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub id: String,
    pub source_gap_id: String,
    pub name: String,
    pub intent: String,
    pub status: CandidateStatus,
    /// `max(1, floor(gap.score))`, stored verbatim and left otherwise unclamped.
    pub priority: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub safety: CandidateSafety,
    pub tests: Vec<String>,
}

impl SkillCandidate {
    pub const MAX_CANDIDATES: usize = 250;
    pub const MAX_NEW_PER_CALL: usize = 5;
    pub const MAX_SYNTHESIZED_PER_CALL: usize = 3;
    pub const MAX_VERIFIED_PER_CALL: usize = 5;

    /// `autonomy-<slug>` naming convention from the planner.
    pub fn slug(input: &str) -> String {
        let lower = input.trim().to_lowercase();
        let mut out = String::with_capacity(lower.len());
        let mut last_dash = false;
        for c in lower.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
                last_dash = false;
            } else if !last_dash && !out.is_empty() {
                out.push('-');
                last_dash = true;
            }
        }
        out.trim_end_matches('-').to_string()
    }
}
