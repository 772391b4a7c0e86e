//! Strict re-read verification of synthesized skill artifacts (§4.6 Verifier).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::forge::synthesizer::{PURPOSE_HEADER, SAFETY_HEADER, VERIFICATION_HEADER};
use crate::types::candidate::{CandidateStatus, SkillCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    FileMissing,
    MissingSection,
    MissingConstraint,
    MissingTest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub candidate_id: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<FailureCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn generated_file_path(workspace: &Path, candidate_name: &str) -> std::path::PathBuf {
    workspace
        .join("skills/autonomy-generated")
        .join(format!("{}.md", SkillCandidate::slug(candidate_name)))
}

async fn verify_one(candidate: &SkillCandidate, workspace: &Path) -> VerificationReport {
    let path = generated_file_path(workspace, &candidate.name);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(_) => {
            return VerificationReport {
                candidate_id: candidate.id.clone(),
                passed: false,
                failure_code: Some(FailureCode::FileMissing),
                detail: Some(format!("generated file missing: {}", path.display())),
            }
        }
    };

    for header in [PURPOSE_HEADER, SAFETY_HEADER, VERIFICATION_HEADER] {
        if !contents.contains(header) {
            return VerificationReport {
                candidate_id: candidate.id.clone(),
                passed: false,
                failure_code: Some(FailureCode::MissingSection),
                detail: Some(format!("missing section header: {header}")),
            };
        }
    }

    for constraint in &candidate.safety.constraints {
        if !contents.contains(constraint.as_str()) {
            return VerificationReport {
                candidate_id: candidate.id.clone(),
                passed: false,
                failure_code: Some(FailureCode::MissingConstraint),
                detail: Some(format!("missing constraint: {constraint}")),
            };
        }
    }

    for test in &candidate.tests {
        if !contents.contains(test.as_str()) {
            return VerificationReport {
                candidate_id: candidate.id.clone(),
                passed: false,
                failure_code: Some(FailureCode::MissingTest),
                detail: Some(format!("missing test: {test}")),
            };
        }
    }

    VerificationReport {
        candidate_id: candidate.id.clone(),
        passed: true,
        failure_code: None,
        detail: None,
    }
}

/// Verify up to [`SkillCandidate::MAX_VERIFIED_PER_CALL`] `planned` candidates,
/// promoting each to `verified` or `rejected`.
pub async fn verify_candidates(
    candidates: &mut [SkillCandidate],
    workspace: &Path,
    now_ms: i64,
) -> Vec<VerificationReport> {
    let mut reports = Vec::new();
    let mut checked = 0usize;
    for candidate in candidates.iter_mut() {
        if checked >= SkillCandidate::MAX_VERIFIED_PER_CALL {
            break;
        }
        if candidate.status != CandidateStatus::Planned {
            continue;
        }
        checked += 1;
        let report = verify_one(candidate, workspace).await;
        candidate.status = if report.passed {
            CandidateStatus::Verified
        } else {
            CandidateStatus::Rejected
        };
        candidate.updated_at = now_ms;
        reports.push(report);
    }
    reports
}
