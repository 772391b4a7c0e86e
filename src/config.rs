//! Typed engine configuration and the overrides record `Prepare` accepts.
//!
//! Replaces "dynamic optional objects for config" (Design Notes §9): every
//! tunable is a named, explicitly `Option<T>` field on [`ConfigOverrides`],
//! applied against the [`EngineConfig`] default base. No ad-hoc property bags.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fully resolved configuration for one agent's control loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub mission: String,
    pub goals_file: String,
    pub tasks_file: String,
    pub log_file: String,

    pub max_actions_per_run: u32,
    pub dedupe_window_ms: i64,
    pub max_queued_events: u32,

    pub safety: SafetyConfig,
}

/// Safety-policy tunables (`AgentState.safety` in the data model).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyConfig {
    pub daily_token_budget: Option<u64>,
    pub daily_cycle_budget: Option<u64>,
    pub max_consecutive_errors: u32,
    pub auto_pause_on_budget_exhausted: bool,
    pub auto_resume_on_new_day_budget_pause: bool,
    pub error_pause_minutes: u32,
    pub stale_task_hours: u32,
    pub emit_daily_review_events: bool,
    pub emit_weekly_review_events: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            daily_token_budget: None,
            daily_cycle_budget: None,
            max_consecutive_errors: 5,
            auto_pause_on_budget_exhausted: true,
            auto_resume_on_new_day_budget_pause: true,
            error_pause_minutes: 30,
            stale_task_hours: 24,
            emit_daily_review_events: true,
            emit_weekly_review_events: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mission: String::new(),
            goals_file: "AUTONOMY_GOALS.md".to_string(),
            tasks_file: "AUTONOMY_TASKS.md".to_string(),
            log_file: "AUTONOMY_LOG.md".to_string(),
            max_actions_per_run: 5,
            dedupe_window_ms: 15 * 60 * 1000,
            max_queued_events: 200,
            safety: SafetyConfig::default(),
        }
    }
}

/// Partial patch applied over [`EngineConfig`] on every `Prepare` call.
///
/// Every field is explicitly optional; an absent field leaves the existing
/// persisted value (or the default, on first load) untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub mission: Option<String>,
    pub goals_file: Option<String>,
    pub tasks_file: Option<String>,
    pub log_file: Option<String>,

    pub max_actions_per_run: Option<u32>,
    pub dedupe_window_minutes: Option<u32>,
    pub max_queued_events: Option<u32>,

    pub daily_token_budget: Option<u64>,
    pub daily_cycle_budget: Option<u64>,
    pub max_consecutive_errors: Option<u32>,
    pub auto_pause_on_budget_exhausted: Option<bool>,
    pub auto_resume_on_new_day_budget_pause: Option<bool>,
    pub error_pause_minutes: Option<u32>,
    pub stale_task_hours: Option<u32>,
    pub emit_daily_review_events: Option<bool>,
    pub emit_weekly_review_events: Option<bool>,

    pub paused: Option<bool>,
}

impl EngineConfig {
    /// Apply an overrides record, validating each touched field's range.
    pub fn apply(&self, overrides: &ConfigOverrides) -> Result<EngineConfig, ConfigError> {
        let mut next = self.clone();

        if let Some(v) = &overrides.mission {
            next.mission = v.trim().to_string();
        }
        if let Some(v) = &overrides.goals_file {
            next.goals_file = v.clone();
        }
        if let Some(v) = &overrides.tasks_file {
            next.tasks_file = v.clone();
        }
        if let Some(v) = &overrides.log_file {
            next.log_file = v.clone();
        }

        if let Some(v) = overrides.max_actions_per_run {
            if !(1..=20).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: "maxActionsPerRun".into(),
                    value: v.to_string(),
                });
            }
            next.max_actions_per_run = v;
        }

        if let Some(minutes) = overrides.dedupe_window_minutes {
            let ms = minutes as i64 * 60 * 1000;
            if !(60_000..=86_400_000).contains(&ms) {
                return Err(ConfigError::OutOfRange {
                    field: "dedupeWindowMs".into(),
                    value: ms.to_string(),
                });
            }
            next.dedupe_window_ms = ms;
        }

        if let Some(v) = overrides.max_queued_events {
            if !(1..=500).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: "maxQueuedEvents".into(),
                    value: v.to_string(),
                });
            }
            next.max_queued_events = v;
        }

        if let Some(v) = overrides.daily_token_budget {
            next.safety.daily_token_budget = Some(v);
        }
        if let Some(v) = overrides.daily_cycle_budget {
            next.safety.daily_cycle_budget = Some(v);
        }
        if let Some(v) = overrides.max_consecutive_errors {
            if !(1..=100).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: "maxConsecutiveErrors".into(),
                    value: v.to_string(),
                });
            }
            next.safety.max_consecutive_errors = v;
        }
        if let Some(v) = overrides.auto_pause_on_budget_exhausted {
            next.safety.auto_pause_on_budget_exhausted = v;
        }
        if let Some(v) = overrides.auto_resume_on_new_day_budget_pause {
            next.safety.auto_resume_on_new_day_budget_pause = v;
        }
        if let Some(v) = overrides.error_pause_minutes {
            if !(1..=1440).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: "errorPauseMinutes".into(),
                    value: v.to_string(),
                });
            }
            next.safety.error_pause_minutes = v;
        }
        if let Some(v) = overrides.stale_task_hours {
            if !(1..=720).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: "staleTaskHours".into(),
                    value: v.to_string(),
                });
            }
            next.safety.stale_task_hours = v;
        }
        if let Some(v) = overrides.emit_daily_review_events {
            next.safety.emit_daily_review_events = v;
        }
        if let Some(v) = overrides.emit_weekly_review_events {
            next.safety.emit_weekly_review_events = v;
        }

        Ok(next)
    }
}
