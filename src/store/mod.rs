//! The durable per-agent store (§4.1): state document, event queue, ledger,
//! run-lock, under a per-agent directory.

pub mod dedupe;
pub mod lock;
pub mod paths;

use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::fswrite;
use crate::types::event::{EnqueueEventParams, Event};
use crate::types::state::{AgentState, MAX_GOALS, MAX_RECENT_CYCLES, MAX_RECENT_EVENTS, MAX_TASKS};
use paths::AgentPaths;

const MAX_EVENT_QUEUE_LINES: usize = 5000;

/// Result of draining the event queue for one cycle.
#[derive(Debug, Clone)]
pub struct DrainResult {
    pub events: Vec<Event>,
    pub dropped_duplicates: u32,
    pub dropped_invalid: u32,
    pub dropped_overflow: u32,
    pub remaining: u32,
}

/// Owns on-disk representation for one agent.
pub struct Store {
    config_root: PathBuf,
}

impl Store {
    pub fn new(config_root: PathBuf) -> Self {
        Self { config_root }
    }

    fn paths(&self, agent_id: &str) -> AgentPaths {
        AgentPaths::new(&self.config_root, agent_id)
    }

    pub fn has_state(&self, agent_id: &str) -> bool {
        self.paths(agent_id).state_file.exists()
    }

    /// Load (or lazily create) the persisted state for `agent_id`, coercing
    /// it into a fully-initialized, cap-respecting document.
    pub async fn load_state(
        &self,
        agent_id: &str,
        defaults: &EngineConfig,
        now_ms: i64,
    ) -> Result<AgentState, StoreError> {
        let paths = self.paths(agent_id);

        let mut state = match read_state_file(&paths.state_file) {
            Some(s) => s,
            None => match read_state_file(&paths.backup_file) {
                Some(s) => s,
                None => AgentState::new_default(agent_id, defaults, now_ms),
            },
        };

        normalize_loaded_state(&mut state, defaults.dedupe_window_ms, now_ms);

        self.save_state(&state).await?;
        Ok(state)
    }

    /// Persist `state`: primary then backup, both atomic per-path writes.
    pub async fn save_state(&self, state: &AgentState) -> Result<(), StoreError> {
        let paths = self.paths(&state.agent_id);
        let json = serde_json::to_vec_pretty(state)?;
        fswrite::write_atomic(&paths.state_file, json.clone()).await?;
        fswrite::write_atomic(&paths.backup_file, json).await?;
        Ok(())
    }

    /// Append one event to the queue, assigning an id if absent.
    pub async fn enqueue_event(
        &self,
        agent_id: &str,
        params: EnqueueEventParams,
        now_ms: i64,
    ) -> Result<Event, StoreError> {
        let paths = self.paths(agent_id);
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            source: params.source,
            event_type: params.event_type,
            ts: params.ts.unwrap_or(now_ms),
            dedupe_key: params.dedupe_key,
            payload: params.payload,
        };
        let line = serde_json::to_string(&event)?;
        fswrite::append_line(&paths.events_file, line).await?;
        Ok(event)
    }

    /// Drain the event queue: drop overflow/invalid lines, admit up to
    /// `max_events` undeduplicated items, write the residual queue back.
    pub async fn drain_events(
        &self,
        agent_id: &str,
        state: &mut AgentState,
        max_events: u32,
        now_ms: i64,
    ) -> Result<DrainResult, StoreError> {
        let paths = self.paths(agent_id);
        let raw = match tokio::fs::read_to_string(&paths.events_file).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::from(e)),
        };

        let mut lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

        let mut dropped_overflow = 0u32;
        if lines.len() > MAX_EVENT_QUEUE_LINES {
            let overflow = lines.len() - MAX_EVENT_QUEUE_LINES;
            dropped_overflow = overflow as u32;
            lines = lines.split_off(overflow);
        }

        let mut parsed: Vec<Event> = Vec::with_capacity(lines.len());
        let mut dropped_invalid = 0u32;
        for line in &lines {
            match serde_json::from_str::<Event>(line) {
                Ok(ev) => parsed.push(ev),
                Err(_) => dropped_invalid += 1,
            }
        }

        dedupe::prune(&mut state.dedupe, now_ms, state.dedupe_window_ms);

        let mut admitted = Vec::new();
        let mut residual = Vec::new();
        let mut dropped_duplicates = 0u32;

        for event in parsed {
            if admitted.len() >= max_events as usize {
                residual.push(event);
                continue;
            }
            let key = event.effective_dedupe_key();
            if dedupe::admit(&mut state.dedupe, &key, now_ms, state.dedupe_window_ms) {
                admitted.push(event);
            } else {
                dropped_duplicates += 1;
            }
        }

        let remaining = residual.len() as u32;
        let residual_lines: Vec<String> = residual
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect();
        let contents = if residual_lines.is_empty() {
            Vec::new()
        } else {
            format!("{}\n", residual_lines.join("\n")).into_bytes()
        };
        fswrite::write_atomic(&paths.events_file, contents).await?;

        Ok(DrainResult {
            events: admitted,
            dropped_duplicates,
            dropped_invalid,
            dropped_overflow,
            remaining,
        })
    }

    /// Append one ledger entry line (hash-chaining handled by the ledger module).
    pub fn ledger_path(&self, agent_id: &str) -> PathBuf {
        self.paths(agent_id).ledger_file
    }

    pub fn lock_path(&self, agent_id: &str) -> PathBuf {
        self.paths(agent_id).lock_file
    }

    /// Delete the agent directory entirely. Operator action only.
    pub async fn reset_runtime(&self, agent_id: &str) -> Result<(), StoreError> {
        let paths = self.paths(agent_id);
        match tokio::fs::remove_dir_all(&paths.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

fn read_state_file(path: &std::path::Path) -> Option<AgentState> {
    let contents = std::fs::read_to_string(path).ok()?;
    if contents.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&contents).ok()
}

fn normalize_loaded_state(state: &mut AgentState, dedupe_window_ms: i64, now_ms: i64) {
    if state.goals.len() > MAX_GOALS {
        let overflow = state.goals.len() - MAX_GOALS;
        state.goals.drain(0..overflow);
    }
    if state.tasks.len() > MAX_TASKS {
        let overflow = state.tasks.len() - MAX_TASKS;
        state.tasks.drain(0..overflow);
    }
    if state.recent_events.len() > MAX_RECENT_EVENTS {
        let overflow = state.recent_events.len() - MAX_RECENT_EVENTS;
        state.recent_events.drain(0..overflow);
    }
    if state.recent_cycles.len() > MAX_RECENT_CYCLES {
        let overflow = state.recent_cycles.len() - MAX_RECENT_CYCLES;
        state.recent_cycles.drain(0..overflow);
    }

    dedupe::prune(&mut state.dedupe, now_ms, dedupe_window_ms);

    let today = crate::timekeys::day_key(now_ms);
    if state.budget.day_key != today {
        state.budget.day_key = today;
        state.budget.cycles_used = 0;
        state.budget.tokens_used = 0;
    }

    if !state.paused {
        state.clear_pause();
    }
}
