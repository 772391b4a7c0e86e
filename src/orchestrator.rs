//! The runtime orchestrator: `prepare`/`finalize` around one agent cycle (§4.11).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::canary::{self, CanaryStatus};
use crate::config::{ConfigOverrides, EngineConfig};
use crate::error::EngineError;
use crate::eval;
use crate::forge;
use crate::gaps;
use crate::ledger;
use crate::phase::{self, Stage};
use crate::policy::{self, EvaluateParams, PolicyConfig};
use crate::promotion::{self, PromotionGateConfig};
use crate::signal;
use crate::store::{self, Store};
use crate::types::candidate::CandidateStatus;
use crate::types::event::{EnqueueEventParams, Event, EventSource};
use crate::types::ledger::{LedgerEntry, LedgerEventType};
use crate::types::state::{AgentState, CycleRecord, CycleStatus, PauseReason, TaskStatus};

/// Additional signal events a host can contribute once per cycle, merged
/// deterministically into the discovery pipeline.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub source: EventSource,
    pub event_type: String,
    pub dedupe_key: Option<String>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct HookInput {
    pub agent_id: String,
    pub workspace_dir: PathBuf,
    pub stage: Stage,
    pub now_ms: i64,
}

/// Optional named hook invoked once per cycle to contribute extra signal
/// events. Mirrors the teacher's trait-object policy/provider seams.
#[async_trait]
pub trait AutonomySignalHook: Send + Sync {
    async fn autonomy_signal(&self, input: &HookInput, known_events: &[Event]) -> Vec<HookEvent>;
}

/// No-op default so the engine is usable without a host-provided hook.
pub struct NoopSignalHook;

#[async_trait]
impl AutonomySignalHook for NoopSignalHook {
    async fn autonomy_signal(&self, _input: &HookInput, _known_events: &[Event]) -> Vec<HookEvent> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct PrepareParams {
    pub agent_id: String,
    pub workspace_dir: PathBuf,
    pub config_overrides: Option<ConfigOverrides>,
    pub now_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Prepared {
    pub state: AgentState,
    pub events: Vec<Event>,
    pub dropped_duplicates: u32,
    pub dropped_invalid: u32,
    pub dropped_overflow: u32,
    pub remaining_events: u32,
    pub cycle_started_at: i64,
    pub lock_token: String,
    pub correlation_id: String,
}

#[derive(Debug, Clone)]
pub struct Skipped {
    pub reason: String,
    pub state: Option<AgentState>,
}

#[derive(Debug, Clone)]
pub enum PrepareOutcome {
    Prepared(Prepared),
    Skipped(Skipped),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatusInput {
    Ok,
    Error,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FinalizeParams {
    pub agent_id: String,
    pub workspace_dir: PathBuf,
    pub status: CycleStatusInput,
    pub summary: String,
    pub error: Option<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub now_ms: i64,
    pub lock_token: String,
    pub events: Vec<Event>,
    pub dropped_duplicates: u32,
    pub dropped_invalid: u32,
    pub dropped_overflow: u32,
    pub remaining_events: u32,
}

/// One agent's autonomy control loop.
pub struct Engine {
    store: Store,
    hook: Arc<dyn AutonomySignalHook>,
    policy_config: PolicyConfig,
    promotion_gate_config: PromotionGateConfig,
}

impl Engine {
    pub fn new(config_root: PathBuf) -> Self {
        Self {
            store: Store::new(config_root),
            hook: Arc::new(NoopSignalHook),
            policy_config: PolicyConfig::default(),
            promotion_gate_config: PromotionGateConfig::default(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn AutonomySignalHook>) -> Self {
        self.hook = hook;
        self
    }

    pub async fn has_state(&self, agent_id: &str) -> bool {
        self.store.has_state(agent_id)
    }

    /// `LoadState`: read an agent's durable state as-is, applying defaults for
    /// any field missing from a first-ever load. Operator controls (tune,
    /// pause, resume) are structural updates to the returned value persisted
    /// back through [`Engine::save_state`].
    pub async fn load_state(&self, agent_id: &str, now_ms: i64) -> Result<AgentState, EngineError> {
        let defaults = EngineConfig::default();
        Ok(self.store.load_state(agent_id, &defaults, now_ms).await?)
    }

    /// Persist a structural update to an agent's state (tune/pause/resume).
    pub async fn save_state(&self, state: &AgentState) -> Result<(), EngineError> {
        Ok(self.store.save_state(state).await?)
    }

    pub async fn reset_runtime(&self, agent_id: &str) -> Result<(), EngineError> {
        tracing::warn!(agent_id, "resetting autonomy runtime state");
        Ok(self.store.reset_runtime(agent_id).await?)
    }

    pub async fn enqueue_event(
        &self,
        agent_id: &str,
        params: EnqueueEventParams,
        now_ms: i64,
    ) -> Result<Event, EngineError> {
        Ok(self.store.enqueue_event(agent_id, params, now_ms).await?)
    }

    pub async fn read_ledger(
        &self,
        agent_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let path = self.store.ledger_path(agent_id);
        Ok(ledger::read(&path, limit, offset).await?)
    }

    #[tracing::instrument(skip(self, params), fields(agent_id = %params.agent_id))]
    pub async fn prepare(&self, params: PrepareParams) -> Result<PrepareOutcome, EngineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let defaults = EngineConfig::default();
        let mut state = self.store.load_state(&params.agent_id, &defaults, params.now_ms).await?;

        if let Some(overrides) = &params.config_overrides {
            apply_overrides(&mut state, overrides, params.now_ms)?;
        }

        refresh_budget_window(&mut state, params.now_ms);
        apply_auto_resume(&mut state, params.now_ms);

        if state.paused {
            let reason = format!(
                "autonomy paused ({})",
                state
                    .pause_reason
                    .map(|r| format!("{r:?}").to_lowercase())
                    .unwrap_or_default()
            );
            self.store.save_state(&state).await?;
            return Ok(PrepareOutcome::Skipped(Skipped {
                reason,
                state: Some(state),
            }));
        }

        if budget_exhausted(&state) {
            if state.safety.auto_pause_on_budget_exhausted {
                state.set_pause(PauseReason::Budget, params.now_ms);
            }
            self.store.save_state(&state).await?;
            return Ok(PrepareOutcome::Skipped(Skipped {
                reason: "autonomy budget exhausted".to_string(),
                state: Some(state),
            }));
        }

        let lock_file = self.store.lock_path(&params.agent_id);
        let lock_token = match store::lock::acquire(&lock_file, params.now_ms) {
            Ok(token) => token,
            Err(_) => {
                return Ok(PrepareOutcome::Skipped(Skipped {
                    reason: "autonomy run already in progress".to_string(),
                    state: Some(state),
                }))
            }
        };

        ensure_workspace_files(&params.workspace_dir, &state).await?;

        let drain = self
            .store
            .drain_events(&params.agent_id, &mut state, state.max_queued_events, params.now_ms)
            .await?;

        let today = crate::timekeys::day_key(params.now_ms);
        let week = crate::timekeys::iso_week_key(params.now_ms);

        let mut events = drain.events;
        events.push(synthetic_event_keyed(
            EventSource::Cron,
            "cron.tick",
            Some(format!("cron.tick:{today}")),
            params.now_ms,
        ));

        if drain.dropped_overflow > 0 {
            events.push(synthetic_event_keyed(
                EventSource::Manual,
                "autonomy.queue.overflow",
                Some(format!("autonomy.queue.overflow:{today}")),
                params.now_ms,
            ));
        }
        if drain.dropped_invalid > 0 {
            events.push(synthetic_event_keyed(
                EventSource::Manual,
                "autonomy.queue.invalid",
                Some(format!("autonomy.queue.invalid:{today}")),
                params.now_ms,
            ));
        }

        if state.safety.emit_daily_review_events && state.review.last_daily_review_key.as_deref() != Some(today.as_str())
        {
            events.push(synthetic_event_keyed(
                EventSource::Manual,
                "autonomy.review.daily",
                Some(format!("autonomy.review.daily:{today}")),
                params.now_ms,
            ));
            state.review.last_daily_review_key = Some(today.clone());
        }
        if state.safety.emit_weekly_review_events
            && state.review.last_weekly_review_key.as_deref() != Some(week.as_str())
        {
            events.push(synthetic_event_keyed(
                EventSource::Manual,
                "autonomy.review.weekly",
                Some(format!("autonomy.review.weekly:{week}")),
                params.now_ms,
            ));
            state.review.last_weekly_review_key = Some(week);
        }

        emit_stale_task_events(&mut state, &mut events, &today, params.now_ms);

        let hook_input = HookInput {
            agent_id: params.agent_id.clone(),
            workspace_dir: params.workspace_dir.clone(),
            stage: state.augmentation.stage,
            now_ms: params.now_ms,
        };
        let hook_events = self.hook.autonomy_signal(&hook_input, &events).await;
        for he in hook_events {
            events.push(Event {
                id: Uuid::new_v4().to_string(),
                source: he.source,
                event_type: he.event_type,
                ts: params.now_ms,
                dedupe_key: he.dedupe_key,
                payload: he.payload,
            });
        }

        for event in &events {
            state.push_recent_event(event.clone());
        }

        for sig in signal::normalize(&events) {
            gaps::upsert(&mut state.augmentation.gaps, &sig, params.now_ms);
        }
        gaps::rerank(&mut state.augmentation.gaps);

        self.run_forge_and_canary(&mut state, &params.workspace_dir, params.now_ms).await?;

        consume_approval_grants(&mut state, &events, params.now_ms);

        self.advance_stage(
            &mut state,
            &params.agent_id,
            &correlation_id,
            params.now_ms,
        )
        .await?;

        self.store.save_state(&state).await?;

        Ok(PrepareOutcome::Prepared(Prepared {
            state,
            events,
            dropped_duplicates: drain.dropped_duplicates,
            dropped_invalid: drain.dropped_invalid,
            dropped_overflow: drain.dropped_overflow,
            remaining_events: drain.remaining,
            cycle_started_at: params.now_ms,
            lock_token: lock_token.token,
            correlation_id,
        }))
    }

    async fn run_forge_and_canary(
        &self,
        state: &mut AgentState,
        workspace_dir: &std::path::Path,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        match state.augmentation.stage {
            Stage::Discover | Stage::Design => {
                let gaps = state.augmentation.gaps.clone();
                let candidates = forge::plan_candidates(&state.augmentation.candidates, &gaps, now_ms)?;
                state.augmentation.candidates = candidates;
            }
            Stage::Synthesize => {
                forge::synthesize_candidates(&mut state.augmentation.candidates, workspace_dir, now_ms).await?;
            }
            Stage::Verify => {
                forge::verify_candidates(&mut state.augmentation.candidates, workspace_dir, now_ms).await;
            }
            Stage::Canary => {
                let input = canary::derive_from_recent_cycles(state, 0.2, 50.0);
                let result = canary::evaluate(&input);
                if result.should_rollback {
                    canary::rollback_verified_candidates(state);
                    let ledger_path = self.store.ledger_path(&state.agent_id);
                    ledger::append(
                        &ledger_path,
                        rollback_entry(state, &result.reason, now_ms),
                        now_ms,
                    )
                    .await?;
                } else {
                    let ledger_path = self.store.ledger_path(&state.agent_id);
                    ledger::append(
                        &ledger_path,
                        promotion_note_entry(state, &result.reason, now_ms),
                        now_ms,
                    )
                    .await?;
                }
            }
            Stage::Promote => {
                let verified = state
                    .augmentation
                    .candidates
                    .iter()
                    .filter(|c| c.status == CandidateStatus::Verified)
                    .count() as u32;
                let error_rate = canary::recent_error_rate(state);
                let blocked_tasks = state
                    .tasks
                    .iter()
                    .filter(|t| t.status == TaskStatus::Blocked)
                    .count() as u32;
                let pack = eval::default_scenario_pack();
                let score = eval::run_eval(
                    &pack,
                    &eval::EvalInputs {
                        verified_candidates: verified,
                        recent_error_rate: error_rate,
                        blocked_tasks,
                    },
                );
                state.augmentation.last_eval_score = Some(score);
                state.augmentation.last_eval_at = Some(now_ms);
            }
            _ => {}
        }
        Ok(())
    }

    async fn advance_stage(
        &self,
        state: &mut AgentState,
        agent_id: &str,
        correlation_id: &str,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        let next = phase::resolve_next_stage(state);
        if next == state.augmentation.stage {
            return Ok(());
        }

        if next == Stage::Observe && state.augmentation.stage == Stage::Promote {
            let canary_status = derive_canary_status(state);
            let gate = promotion::evaluate(state, canary_status, &self.promotion_gate_config);
            if !gate.passed {
                self.emit_policy_denied(state, agent_id, correlation_id, &gate.reason, now_ms)
                    .await?;
                return Ok(());
            }
        }

        let execution_class = phase::execution_class_for_stage(next);
        let action = format!("autonomy.stage.{next:?}").to_lowercase();
        let approved = policy::consume_approval(state, &action, now_ms);
        let decision = policy::evaluate(
            &EvaluateParams {
                action: &action,
                execution_class,
                approved_by_operator: approved,
            },
            &self.policy_config,
        );
        if !decision.allowed {
            self.emit_policy_denied(state, agent_id, correlation_id, &decision.reason, now_ms)
                .await?;
            return Ok(());
        }

        let from = state.augmentation.stage;
        let stage_entered_at = state.augmentation.stage_entered_at;
        phase::transition_stage(state, next, "resolved by cycle", now_ms)?;

        let ledger_path = self.store.ledger_path(agent_id);
        ledger::append(
            &ledger_path,
            LedgerEntry {
                id: String::new(),
                agent_id: agent_id.to_string(),
                ts: now_ms,
                correlation_id: correlation_id.to_string(),
                event_type: LedgerEventType::PhaseExit,
                stage: from,
                actor: "orchestrator".into(),
                summary: format!("exiting {from:?} after {}ms", now_ms - stage_entered_at),
                evidence: None,
                prev_hash: String::new(),
                entry_hash: String::new(),
                chain_broken: false,
            },
            now_ms,
        )
        .await?;
        ledger::append(
            &ledger_path,
            LedgerEntry {
                id: String::new(),
                agent_id: agent_id.to_string(),
                ts: now_ms,
                correlation_id: correlation_id.to_string(),
                event_type: LedgerEventType::PhaseEnter,
                stage: next,
                actor: "orchestrator".into(),
                summary: format!("entering {next:?}"),
                evidence: None,
                prev_hash: String::new(),
                entry_hash: String::new(),
                chain_broken: false,
            },
            now_ms,
        )
        .await?;

        Ok(())
    }

    async fn emit_policy_denied(
        &self,
        state: &mut AgentState,
        agent_id: &str,
        correlation_id: &str,
        reason: &str,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        state.push_recent_event(synthetic_event(
            EventSource::Manual,
            "autonomy.augmentation.policy.denied",
            now_ms,
        ));
        let ledger_path = self.store.ledger_path(agent_id);
        ledger::append(
            &ledger_path,
            LedgerEntry {
                id: String::new(),
                agent_id: agent_id.to_string(),
                ts: now_ms,
                correlation_id: correlation_id.to_string(),
                event_type: LedgerEventType::PolicyDenied,
                stage: state.augmentation.stage,
                actor: "policy".into(),
                summary: reason.to_string(),
                evidence: None,
                prev_hash: String::new(),
                entry_hash: String::new(),
                chain_broken: false,
            },
            now_ms,
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, params), fields(agent_id = %params.agent_id))]
    pub async fn finalize(&self, params: FinalizeParams) -> Result<(), EngineError> {
        let defaults = EngineConfig::default();
        let mut state = self.store.load_state(&params.agent_id, &defaults, params.now_ms).await?;

        state.metrics.cycles += 1;
        if params.status != CycleStatusInput::Skipped {
            state.budget.tokens_used += params.tokens_used;
            state.budget.cycles_used += 1;
        }

        let cycle_status = match params.status {
            CycleStatusInput::Ok => {
                state.metrics.ok += 1;
                state.metrics.consecutive_errors = 0;
                CycleStatus::Ok
            }
            CycleStatusInput::Error => {
                state.metrics.error += 1;
                state.metrics.consecutive_errors += 1;
                state.metrics.last_error = params.error.clone();
                CycleStatus::Error
            }
            CycleStatusInput::Skipped => CycleStatus::Skipped,
        };
        state.metrics.last_cycle_at = Some(params.now_ms);

        state.push_cycle(CycleRecord {
            ts: params.now_ms,
            status: cycle_status,
            duration_ms: params.duration_ms,
        });

        if cycle_status == CycleStatus::Error
            && state.metrics.consecutive_errors >= state.safety.max_consecutive_errors
            && !state.paused
        {
            state.set_pause(PauseReason::Errors, params.now_ms);
        }

        if let Err(err) = append_log_block(&state, &params, &params.workspace_dir).await {
            tracing::warn!(agent_id = %params.agent_id, error = %err, "failed to append cycle log block");
        }

        self.store.save_state(&state).await?;
        store::lock::release(
            &self.store.lock_path(&params.agent_id),
            &store::lock::LockToken {
                token: params.lock_token.clone(),
            },
        );
        Ok(())
    }
}

fn derive_canary_status(state: &AgentState) -> Option<CanaryStatus> {
    if !state
        .augmentation
        .candidates
        .iter()
        .any(|c| c.status == CandidateStatus::Verified || c.status == CandidateStatus::Rejected)
    {
        return None;
    }
    let input = canary::derive_from_recent_cycles(state, 0.2, 50.0);
    Some(canary::evaluate(&input).status)
}

fn apply_overrides(
    state: &mut AgentState,
    overrides: &ConfigOverrides,
    now_ms: i64,
) -> Result<(), EngineError> {
    let current = EngineConfig {
        mission: state.mission.clone(),
        goals_file: state.goals_file.clone(),
        tasks_file: state.tasks_file.clone(),
        log_file: state.log_file.clone(),
        max_actions_per_run: state.max_actions_per_run,
        dedupe_window_ms: state.dedupe_window_ms,
        max_queued_events: state.max_queued_events,
        safety: state.safety.clone(),
    };
    let next = current.apply(overrides)?;
    state.mission = next.mission;
    state.goals_file = next.goals_file;
    state.tasks_file = next.tasks_file;
    state.log_file = next.log_file;
    state.max_actions_per_run = next.max_actions_per_run;
    state.dedupe_window_ms = next.dedupe_window_ms;
    state.max_queued_events = next.max_queued_events;
    state.safety = next.safety;
    if let Some(paused) = overrides.paused {
        if paused {
            state.set_pause(PauseReason::Manual, now_ms);
        } else {
            state.clear_pause();
        }
    }
    Ok(())
}

fn refresh_budget_window(state: &mut AgentState, now_ms: i64) {
    let today = crate::timekeys::day_key(now_ms);
    if state.budget.day_key != today {
        state.budget.day_key = today;
        state.budget.cycles_used = 0;
        state.budget.tokens_used = 0;
    }
}

/// `sameDayBudgetFresh`: an Open Question resolution (§9) — treated as an
/// intentional accommodation for operators who reset usage via `tune`.
fn same_day_budget_fresh(state: &AgentState) -> bool {
    state.budget.cycles_used == 0 && state.budget.tokens_used == 0
}

fn apply_auto_resume(state: &mut AgentState, now_ms: i64) {
    match state.pause_reason {
        Some(PauseReason::Budget) => {
            let today = crate::timekeys::day_key(now_ms);
            let rolled_over = state.budget.day_key != today;
            if (rolled_over || same_day_budget_fresh(state)) && state.safety.auto_resume_on_new_day_budget_pause
            {
                state.clear_pause();
                state.budget.cycles_used = 0;
                state.budget.tokens_used = 0;
                state.push_recent_event(Event {
                    id: Uuid::new_v4().to_string(),
                    source: EventSource::Manual,
                    event_type: "autonomy.resume".to_string(),
                    ts: now_ms,
                    dedupe_key: None,
                    payload: Some(json!({"reason": "budget-window-rollover"})),
                });
            }
        }
        Some(PauseReason::Errors) => {
            if let Some(paused_at) = state.paused_at {
                let elapsed_minutes = (now_ms - paused_at) / 60_000;
                if elapsed_minutes >= state.safety.error_pause_minutes as i64 {
                    state.clear_pause();
                    state.metrics.consecutive_errors = 0;
                    state.push_recent_event(Event {
                        id: Uuid::new_v4().to_string(),
                        source: EventSource::Manual,
                        event_type: "autonomy.resume".to_string(),
                        ts: now_ms,
                        dedupe_key: None,
                        payload: Some(json!({"reason": "error-cooldown-elapsed"})),
                    });
                }
            }
        }
        _ => {}
    }
}

fn budget_exhausted(state: &AgentState) -> bool {
    if let Some(cycle_budget) = state.safety.daily_cycle_budget {
        if state.budget.cycles_used >= cycle_budget {
            return true;
        }
    }
    if let Some(token_budget) = state.safety.daily_token_budget {
        if state.budget.tokens_used >= token_budget {
            return true;
        }
    }
    false
}

fn synthetic_event(source: EventSource, event_type: &str, now_ms: i64) -> Event {
    synthetic_event_keyed(source, event_type, None, now_ms)
}

/// Like `synthetic_event`, but with an explicit dedupe key so recurring
/// cycle-level signals (heartbeat, queue health, reviews) cluster into one
/// gap-registry entry instead of minting a fresh one every cycle.
fn synthetic_event_keyed(
    source: EventSource,
    event_type: &str,
    dedupe_key: Option<String>,
    now_ms: i64,
) -> Event {
    Event {
        id: Uuid::new_v4().to_string(),
        source,
        event_type: event_type.to_string(),
        ts: now_ms,
        dedupe_key,
        payload: None,
    }
}

fn emit_stale_task_events(state: &mut AgentState, events: &mut Vec<Event>, today: &str, now_ms: i64) {
    let stale_ms = state.safety.stale_task_hours as i64 * 60 * 60 * 1000;
    let stale_task_ids: Vec<(String, TaskStatus, i64)> = state
        .tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Blocked | TaskStatus::InProgress))
        .filter(|t| now_ms - t.updated_at >= stale_ms)
        .map(|t| (t.id.clone(), t.status, t.updated_at))
        .collect();

    for (task_id, status, _) in stale_task_ids {
        let already_emitted = state
            .task_signals
            .get(&task_id)
            .map(|d| d == today)
            .unwrap_or(false);
        if already_emitted {
            continue;
        }
        let status_name = format!("{status:?}").to_lowercase();
        events.push(Event {
            id: Uuid::new_v4().to_string(),
            source: EventSource::Manual,
            event_type: format!("autonomy.task.stale.{status_name}"),
            ts: now_ms,
            dedupe_key: Some(format!("stale:{task_id}:{today}")),
            payload: Some(json!({"taskId": task_id})),
        });
        state.task_signals.insert(task_id, today.to_string());
    }
}

fn consume_approval_grants(state: &mut AgentState, events: &[Event], now_ms: i64) {
    for event in events {
        if event.event_type == "autonomy.approval.grant" {
            if let Some(action) = event.payload.as_ref().and_then(|p| p.get("action")).and_then(|v| v.as_str())
            {
                policy::apply_grant(state, action, "operator", now_ms, 60 * 60 * 1000);
                state.push_recent_event(synthetic_event(EventSource::Manual, "autonomy.approval.applied", now_ms));
            }
        }
    }
}

fn rollback_entry(state: &AgentState, reason: &str, now_ms: i64) -> LedgerEntry {
    LedgerEntry {
        id: String::new(),
        agent_id: state.agent_id.clone(),
        ts: now_ms,
        correlation_id: String::new(),
        event_type: LedgerEventType::Rollback,
        stage: state.augmentation.stage,
        actor: "canary".into(),
        summary: reason.to_string(),
        evidence: None,
        prev_hash: String::new(),
        entry_hash: String::new(),
        chain_broken: false,
    }
}

fn promotion_note_entry(state: &AgentState, reason: &str, now_ms: i64) -> LedgerEntry {
    LedgerEntry {
        id: String::new(),
        agent_id: state.agent_id.clone(),
        ts: now_ms,
        correlation_id: String::new(),
        event_type: LedgerEventType::Promotion,
        stage: state.augmentation.stage,
        actor: "canary".into(),
        summary: reason.to_string(),
        evidence: None,
        prev_hash: String::new(),
        entry_hash: String::new(),
        chain_broken: false,
    }
}

async fn ensure_workspace_files(workspace_dir: &std::path::Path, state: &AgentState) -> Result<(), EngineError> {
    for (name, template) in [
        (&state.goals_file, "# Autonomy Goals\n"),
        (&state.tasks_file, "# Autonomy Tasks\n"),
        (&state.log_file, "# Autonomy Log\n"),
    ] {
        let path = workspace_dir.join(name);
        if tokio::fs::metadata(&path).await.is_err() {
            crate::fswrite::write_atomic(&path, template.as_bytes().to_vec()).await?;
        }
    }
    Ok(())
}

async fn append_log_block(
    state: &AgentState,
    params: &FinalizeParams,
    workspace_dir: &std::path::Path,
) -> std::io::Result<()> {
    let header = chrono::DateTime::from_timestamp_millis(params.now_ms)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default();
    let status = match params.status {
        CycleStatusInput::Ok => "ok",
        CycleStatusInput::Error => "error",
        CycleStatusInput::Skipped => "skipped",
    };
    let digest = params
        .events
        .iter()
        .map(|e| e.event_type.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let block = format!(
        "\n## Cycle {header}\nstatus: {status}\nsummary: {}\nerror: {}\ntokens_used: {}\ncycles_used: {}\nprocessed_events: {}\ndropped_duplicates: {}\ndropped_invalid: {}\ndropped_overflow: {}\nremaining_events: {}\nevents: {}\n",
        params.summary,
        params.error.clone().unwrap_or_default(),
        state.budget.tokens_used,
        state.budget.cycles_used,
        params.events.len(),
        params.dropped_duplicates,
        params.dropped_invalid,
        params.dropped_overflow,
        params.remaining_events,
        digest,
    );
    crate::fswrite::append_line(&workspace_dir.join(&state.log_file), block).await
}
