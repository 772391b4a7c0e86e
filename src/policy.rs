//! First-match-wins policy evaluation for stage-transition actions (§4.5).

use serde::{Deserialize, Serialize};

use crate::types::candidate::ExecutionClass;
use crate::types::state::{AgentState, Approval};

/// Inputs to one policy evaluation.
#[derive(Debug, Clone)]
pub struct EvaluateParams<'a> {
    pub action: &'a str,
    pub execution_class: ExecutionClass,
    pub approved_by_operator: bool,
}

/// Policy configuration: allow/deny lists plus approval requirements by class.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub deny_list: Vec<String>,
    pub allow_list: Vec<String>,
    pub destructive_requires_approval: bool,
    pub reversible_write_requires_approval: bool,
    pub policy_version: u32,
    /// TTL applied to a freshly consumed approval grant, in milliseconds.
    pub approval_ttl_ms: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deny_list: Vec::new(),
            allow_list: Vec::new(),
            destructive_requires_approval: true,
            reversible_write_requires_approval: false,
            policy_version: 1,
            approval_ttl_ms: 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    None,
    Operator,
}

#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
    pub approval_level: ApprovalLevel,
    pub policy_version: u32,
    pub execution_class: ExecutionClass,
}

/// First-match-wins: explicit deny, explicit allow (read-only only), then the
/// approval gates for destructive/reversible-write, else allow.
pub fn evaluate(params: &EvaluateParams, config: &PolicyConfig) -> PolicyDecision {
    let base = PolicyDecision {
        allowed: true,
        reason: "allowed by default".to_string(),
        approval_level: ApprovalLevel::None,
        policy_version: config.policy_version,
        execution_class: params.execution_class,
    };

    if config.deny_list.iter().any(|a| a == params.action) {
        return PolicyDecision {
            allowed: false,
            reason: format!("action {} is explicitly denied", params.action),
            ..base
        };
    }

    if config.allow_list.iter().any(|a| a == params.action)
        && params.execution_class == ExecutionClass::ReadOnly
    {
        return PolicyDecision {
            allowed: true,
            reason: format!("action {} is explicitly allowed", params.action),
            ..base
        };
    }

    if params.execution_class == ExecutionClass::Destructive
        && config.destructive_requires_approval
        && !params.approved_by_operator
    {
        return PolicyDecision {
            allowed: false,
            reason: "destructive action requires operator approval".to_string(),
            approval_level: ApprovalLevel::Operator,
            ..base
        };
    }

    if params.execution_class == ExecutionClass::ReversibleWrite
        && config.reversible_write_requires_approval
        && !params.approved_by_operator
    {
        return PolicyDecision {
            allowed: false,
            reason: "reversible-write action requires operator approval".to_string(),
            approval_level: ApprovalLevel::Operator,
            ..base
        };
    }

    base
}

/// Consume a pending `autonomy.approval.grant` event matching `action`,
/// setting `state.approvals[action]`. Returns true if an approval was applied.
pub fn apply_grant(state: &mut AgentState, action: &str, source: &str, now_ms: i64, ttl_ms: i64) {
    state.approvals.insert(
        action.to_string(),
        Approval {
            action: action.to_string(),
            approved_at: now_ms,
            expires_at: now_ms + ttl_ms,
            source: source.to_string(),
        },
    );
}

/// Whether `action` currently carries a live (unexpired) operator approval.
/// Consuming removes the entry, mirroring the queue-consumption semantics.
pub fn consume_approval(state: &mut AgentState, action: &str, now_ms: i64) -> bool {
    match state.approvals.get(action) {
        Some(approval) if approval.expires_at > now_ms => {
            state.approvals.remove(action);
            true
        }
        Some(_) => {
            state.approvals.remove(action);
            false
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_deny_wins_over_everything() {
        let mut config = PolicyConfig::default();
        config.deny_list.push("autonomy.stage.promote".into());
        let decision = evaluate(
            &EvaluateParams {
                action: "autonomy.stage.promote",
                execution_class: ExecutionClass::ReadOnly,
                approved_by_operator: true,
            },
            &config,
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn destructive_without_approval_is_denied_by_default() {
        let config = PolicyConfig::default();
        let decision = evaluate(
            &EvaluateParams {
                action: "autonomy.stage.promote",
                execution_class: ExecutionClass::Destructive,
                approved_by_operator: false,
            },
            &config,
        );
        assert!(!decision.allowed);
        assert_eq!(decision.approval_level, ApprovalLevel::Operator);
    }

    #[test]
    fn destructive_with_approval_is_allowed() {
        let config = PolicyConfig::default();
        let decision = evaluate(
            &EvaluateParams {
                action: "autonomy.stage.promote",
                execution_class: ExecutionClass::Destructive,
                approved_by_operator: true,
            },
            &config,
        );
        assert!(decision.allowed);
    }

    #[test]
    fn reversible_write_does_not_require_approval_by_default() {
        let config = PolicyConfig::default();
        let decision = evaluate(
            &EvaluateParams {
                action: "autonomy.stage.verify",
                execution_class: ExecutionClass::ReversibleWrite,
                approved_by_operator: false,
            },
            &config,
        );
        assert!(decision.allowed);
    }

    #[test]
    fn consume_approval_removes_expired_entry_and_denies() {
        let cfg = crate::config::EngineConfig::default();
        let mut state = AgentState::new_default("a", &cfg, 0);
        apply_grant(&mut state, "act", "operator", 0, 10);
        assert!(!consume_approval(&mut state, "act", 20));
        assert!(!state.approvals.contains_key("act"));
    }

    #[test]
    fn consume_approval_succeeds_when_live() {
        let cfg = crate::config::EngineConfig::default();
        let mut state = AgentState::new_default("a", &cfg, 0);
        apply_grant(&mut state, "act", "operator", 0, 1000);
        assert!(consume_approval(&mut state, "act", 50));
        assert!(!state.approvals.contains_key("act"));
    }
}
