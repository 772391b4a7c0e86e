//! Idempotent markdown artifact generation for planned skill candidates (§4.6 Synthesizer).

use std::path::Path;

use crate::error::ForgeError;
use crate::fswrite;
use crate::types::candidate::{CandidateStatus, SkillCandidate};

pub const PURPOSE_HEADER: &str = "## Purpose";
pub const SAFETY_HEADER: &str = "## Safety constraints";
pub const VERIFICATION_HEADER: &str = "## Verification checklist";

fn generated_file_path(workspace: &Path, candidate_name: &str) -> std::path::PathBuf {
    workspace
        .join("skills/autonomy-generated")
        .join(format!("{}.md", SkillCandidate::slug(candidate_name)))
}

fn render_markdown(candidate: &SkillCandidate) -> String {
    let mut md = format!("# {}\n\n", candidate.name);
    md.push_str(PURPOSE_HEADER);
    md.push('\n');
    md.push_str(&candidate.intent);
    md.push_str("\n\n");

    md.push_str(SAFETY_HEADER);
    md.push('\n');
    for constraint in &candidate.safety.constraints {
        md.push_str(&format!("- {constraint}\n"));
    }
    md.push('\n');

    md.push_str(VERIFICATION_HEADER);
    md.push('\n');
    for test in &candidate.tests {
        md.push_str(&format!("- {test}\n"));
    }
    md.push('\n');

    md.push_str("## Operational guidance\n");
    md.push_str(&format!(
        "This skill is generated for execution class `{:?}` and must be \
         operated under the promotion and canary gates before production use.\n",
        candidate.safety.execution_class
    ));
    md
}

/// Synthesize markdown files for up to [`SkillCandidate::MAX_SYNTHESIZED_PER_CALL`]
/// `candidate`/`planned` entries, marking each `planned`. Writes are skipped
/// (idempotent) when the rendered content is unchanged.
pub async fn synthesize_candidates(
    candidates: &mut [SkillCandidate],
    workspace: &Path,
    now_ms: i64,
) -> Result<usize, ForgeError> {
    let mut written = 0usize;
    for candidate in candidates.iter_mut() {
        if written >= SkillCandidate::MAX_SYNTHESIZED_PER_CALL {
            break;
        }
        if !matches!(
            candidate.status,
            CandidateStatus::Candidate | CandidateStatus::Planned
        ) {
            continue;
        }

        let path = generated_file_path(workspace, &candidate.name);
        let rendered = render_markdown(candidate);

        let existing = tokio::fs::read_to_string(&path).await.ok();
        if existing.as_deref() != Some(rendered.as_str()) {
            fswrite::write_atomic(&path, rendered.into_bytes()).await?;
        }

        if candidate.status == CandidateStatus::Candidate {
            candidate.status = CandidateStatus::Planned;
            candidate.updated_at = now_ms;
        }
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::candidate::{CandidateSafety, ExecutionClass};

    fn candidate(name: &str) -> SkillCandidate {
        SkillCandidate {
            id: "c1".into(),
            source_gap_id: "g1".into(),
            name: name.into(),
            intent: "Address gap: test".into(),
            status: CandidateStatus::Candidate,
            priority: 10,
            created_at: 0,
            updated_at: 0,
            safety: CandidateSafety {
                execution_class: ExecutionClass::ReversibleWrite,
                constraints: vec!["must not modify files outside the agent workspace".into()],
            },
            tests: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    #[tokio::test]
    async fn writes_file_and_marks_planned() {
        let dir = tempfile::tempdir().unwrap();
        let mut candidates = vec![candidate("autonomy-test-gap")];
        let written = synthesize_candidates(&mut candidates, dir.path(), 100).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(candidates[0].status, CandidateStatus::Planned);
        let path = generated_file_path(dir.path(), "autonomy-test-gap");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn repeated_call_is_idempotent_for_unchanged_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut candidates = vec![candidate("autonomy-test-gap")];
        synthesize_candidates(&mut candidates, dir.path(), 100).await.unwrap();
        let path = generated_file_path(dir.path(), "autonomy-test-gap");
        let first_contents = tokio::fs::read_to_string(&path).await.unwrap();

        synthesize_candidates(&mut candidates, dir.path(), 200).await.unwrap();
        let second_contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(first_contents, second_contents);
    }
}
