//! The single persisted document per agent (§3 "AgentState") and its nested
//! structs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::phase::Stage;
use crate::types::candidate::SkillCandidate;
use crate::types::event::Event;
use crate::types::gap::Gap;

pub const CURRENT_VERSION: u32 = 1;

pub const MAX_TRANSITIONS: usize = 200;
pub const MAX_ACTIVE_EXPERIMENTS: usize = 100;
pub const MAX_DEDUPE_ENTRIES: usize = 5000;
pub const MAX_GOALS: usize = 500;
pub const MAX_TASKS: usize = 2000;
pub const MAX_RECENT_EVENTS: usize = 50;
pub const MAX_RECENT_CYCLES: usize = 50;

/// `dedupe` map is pruned once its population exceeds `dedupeWindowMs *
/// DEDUPE_PRUNE_MULTIPLIER` stale entries; resolves an Open Question left
/// silent by the description of "pruned by dedupeWindowMs x 3".
pub const DEDUPE_PRUNE_MULTIPLIER: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Manual,
    Budget,
    Errors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub day_key: String,
    pub cycles_used: u64,
    pub tokens_used: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            day_key: String::new(),
            cycles_used: 0,
            tokens_used: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_daily_review_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_weekly_review_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub ts: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub action: String,
    pub approved_at: i64,
    pub expires_at: i64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Augmentation {
    pub stage: Stage,
    pub stage_entered_at: i64,
    pub last_transition_at: i64,
    pub last_transition_reason: String,
    pub phase_run_count: u64,
    pub policy_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_eval_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_eval_at: Option<i64>,
    pub gaps: Vec<Gap>,
    pub candidates: Vec<SkillCandidate>,
    pub active_experiments: Vec<String>,
    pub transitions: Vec<Transition>,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            stage: Stage::Discover,
            stage_entered_at: 0,
            last_transition_at: 0,
            last_transition_reason: String::new(),
            phase_run_count: 0,
            policy_version: 1,
            last_eval_score: None,
            last_eval_at: None,
            gaps: Vec::new(),
            candidates: Vec::new(),
            active_experiments: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

impl Augmentation {
    pub fn push_transition(&mut self, t: Transition) {
        self.transitions.push(t);
        if self.transitions.len() > MAX_TRANSITIONS {
            let overflow = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(0..overflow);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Blocked,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Ok,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub ts: i64,
    pub status: CycleStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub cycles: u64,
    pub ok: u64,
    pub error: u64,
    pub skipped: u64,
    pub consecutive_errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// The single logical document persisted per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub version: u32,
    pub agent_id: String,
    pub mission: String,

    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<i64>,

    pub goals_file: String,
    pub tasks_file: String,
    pub log_file: String,

    pub max_actions_per_run: u32,
    pub dedupe_window_ms: i64,
    pub max_queued_events: u32,

    pub safety: crate::config::SafetyConfig,
    pub budget: Budget,
    pub review: Review,
    pub augmentation: Augmentation,

    pub approvals: HashMap<String, Approval>,
    pub task_signals: HashMap<String, String>,
    pub dedupe: HashMap<String, i64>,

    pub goals: Vec<Goal>,
    pub tasks: Vec<Task>,
    pub recent_events: Vec<Event>,
    pub recent_cycles: Vec<CycleRecord>,

    pub metrics: Metrics,
}

impl AgentState {
    /// Build a fresh default state for an agent that has never persisted one,
    /// seeded from `config`.
    pub fn new_default(agent_id: &str, config: &EngineConfig, now_ms: i64) -> Self {
        Self {
            version: CURRENT_VERSION,
            agent_id: agent_id.to_string(),
            mission: config.mission.clone(),
            paused: false,
            pause_reason: None,
            paused_at: None,
            goals_file: config.goals_file.clone(),
            tasks_file: config.tasks_file.clone(),
            log_file: config.log_file.clone(),
            max_actions_per_run: config.max_actions_per_run,
            dedupe_window_ms: config.dedupe_window_ms,
            max_queued_events: config.max_queued_events,
            safety: config.safety.clone(),
            budget: Budget {
                day_key: String::new(),
                cycles_used: 0,
                tokens_used: 0,
            },
            review: Review::default(),
            augmentation: Augmentation {
                stage_entered_at: now_ms,
                last_transition_at: now_ms,
                ..Augmentation::default()
            },
            approvals: HashMap::new(),
            task_signals: HashMap::new(),
            dedupe: HashMap::new(),
            goals: Vec::new(),
            tasks: Vec::new(),
            recent_events: Vec::new(),
            recent_cycles: Vec::new(),
            metrics: Metrics::default(),
        }
    }

    pub fn push_recent_event(&mut self, event: Event) {
        self.recent_events.push(event);
        if self.recent_events.len() > MAX_RECENT_EVENTS {
            let overflow = self.recent_events.len() - MAX_RECENT_EVENTS;
            self.recent_events.drain(0..overflow);
        }
    }

    pub fn push_cycle(&mut self, cycle: CycleRecord) {
        self.recent_cycles.push(cycle);
        if self.recent_cycles.len() > MAX_RECENT_CYCLES {
            let overflow = self.recent_cycles.len() - MAX_RECENT_CYCLES;
            self.recent_cycles.drain(0..overflow);
        }
    }

    pub fn clear_pause(&mut self) {
        self.paused = false;
        self.pause_reason = None;
        self.paused_at = None;
    }

    pub fn set_pause(&mut self, reason: PauseReason, now_ms: i64) {
        self.paused = true;
        self.pause_reason = Some(reason);
        self.paused_at = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_default_state_is_unpaused_and_starts_at_discover() {
        let config = EngineConfig::default();
        let state = AgentState::new_default("agent-1", &config, 1000);
        assert!(!state.paused);
        assert_eq!(state.augmentation.stage, Stage::Discover);
        assert_eq!(state.agent_id, "agent-1");
    }

    #[test]
    fn push_recent_event_evicts_oldest_past_cap() {
        let config = EngineConfig::default();
        let mut state = AgentState::new_default("agent-1", &config, 0);
        for i in 0..(MAX_RECENT_EVENTS + 10) {
            state.push_recent_event(Event {
                id: format!("evt-{i}"),
                source: crate::types::event::EventSource::Cron,
                event_type: "cron.tick".into(),
                ts: i as i64,
                dedupe_key: None,
                payload: None,
            });
        }
        assert_eq!(state.recent_events.len(), MAX_RECENT_EVENTS);
        assert_eq!(state.recent_events.first().unwrap().id, "evt-10");
    }
}
