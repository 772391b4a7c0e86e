//! End-to-end scenarios against the public `Engine` surface, driven through a
//! real temp-directory store (§8 properties exercised top to bottom: pause,
//! auto-resume, error-budget pause, stale-task signals, promotion gating, and
//! discovery-to-gap wiring).

use autonomy_engine::prelude::*;
use autonomy_engine::types::{CycleStatus, LedgerEventType, PauseReason, Task, TaskStatus};

fn finalize_ok(agent_id: &str, workspace: &std::path::Path, lock_token: String, now_ms: i64) -> FinalizeParams {
    FinalizeParams {
        agent_id: agent_id.to_string(),
        workspace_dir: workspace.to_path_buf(),
        status: CycleStatusInput::Ok,
        summary: "ok".to_string(),
        error: None,
        tokens_used: 0,
        duration_ms: 1,
        now_ms,
        lock_token,
        events: Vec::new(),
        dropped_duplicates: 0,
        dropped_invalid: 0,
        dropped_overflow: 0,
        remaining_events: 0,
    }
}

#[tokio::test]
async fn paused_agent_is_skipped_without_touching_queue() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    let overrides = ConfigOverrides {
        paused: Some(true),
        ..Default::default()
    };
    let outcome = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: Some(overrides),
            now_ms: 100,
        })
        .await
        .unwrap();
    match outcome {
        PrepareOutcome::Skipped(s) => assert!(s.reason.contains("paused")),
        PrepareOutcome::Prepared(_) => panic!("expected skipped"),
    }
}

#[tokio::test]
async fn budget_auto_resume_clears_pause_and_emits_resume_event() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    let overrides = ConfigOverrides {
        daily_cycle_budget: Some(1),
        ..Default::default()
    };

    let p0 = match eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: Some(overrides),
            now_ms: 0,
        })
        .await
        .unwrap()
    {
        PrepareOutcome::Prepared(p) => p,
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    };
    eng.finalize(finalize_ok("a1", workspace.path(), p0.lock_token, 0)).await.unwrap();

    match eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: 1,
        })
        .await
        .unwrap()
    {
        PrepareOutcome::Skipped(s) => assert!(s.reason.contains("budget")),
        PrepareOutcome::Prepared(_) => panic!("expected budget-exhausted skip"),
    }

    let next_day_ms = 24 * 60 * 60 * 1000 + 1;
    match eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: next_day_ms,
        })
        .await
        .unwrap()
    {
        PrepareOutcome::Prepared(p) => {
            assert!(!p.state.paused);
            assert!(p.events.iter().any(|e| e.event_type == "autonomy.resume"));
            eng.finalize(finalize_ok("a1", workspace.path(), p.lock_token, next_day_ms))
                .await
                .unwrap();
        }
        PrepareOutcome::Skipped(s) => panic!("expected prepared, got skipped: {}", s.reason),
    }
}

#[tokio::test]
async fn consecutive_errors_trigger_auto_pause() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    let overrides = ConfigOverrides {
        max_consecutive_errors: Some(2),
        ..Default::default()
    };

    let p0 = match eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: Some(overrides),
            now_ms: 0,
        })
        .await
        .unwrap()
    {
        PrepareOutcome::Prepared(p) => p,
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    };
    eng.finalize(FinalizeParams {
        status: CycleStatusInput::Error,
        error: Some("boom".to_string()),
        ..finalize_ok("a1", workspace.path(), p0.lock_token, 0)
    })
    .await
    .unwrap();

    let p1 = match eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: 10,
        })
        .await
        .unwrap()
    {
        PrepareOutcome::Prepared(p) => p,
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    };
    eng.finalize(FinalizeParams {
        status: CycleStatusInput::Error,
        error: Some("boom".to_string()),
        ..finalize_ok("a1", workspace.path(), p1.lock_token, 10)
    })
    .await
    .unwrap();

    let outcome = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: 20,
        })
        .await
        .unwrap();
    match outcome {
        PrepareOutcome::Skipped(s) => {
            let state = s.state.expect("state returned with skip");
            assert!(state.paused);
            assert_eq!(state.pause_reason, Some(PauseReason::Errors));
            assert!(state.metrics.consecutive_errors >= 2);
        }
        PrepareOutcome::Prepared(_) => panic!("expected paused agent to be skipped"),
    }
}

#[tokio::test]
async fn stale_task_emits_once_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    let mut state = eng.load_state("a1", 0).await.unwrap();
    state.tasks.push(Task {
        id: "t1".to_string(),
        title: "blocked task".to_string(),
        status: TaskStatus::Blocked,
        created_at: 0,
        updated_at: 0,
    });
    eng.save_state(&state).await.unwrap();

    let forty_eight_hours_ms = 48 * 60 * 60 * 1000;
    let overrides = ConfigOverrides {
        stale_task_hours: Some(24),
        ..Default::default()
    };

    let first = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: Some(overrides),
            now_ms: forty_eight_hours_ms,
        })
        .await
        .unwrap();
    let lock_token = match first {
        PrepareOutcome::Prepared(p) => {
            assert!(p.events.iter().any(|e| e.event_type.starts_with("autonomy.task.stale.")));
            p.lock_token
        }
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    };
    eng.finalize(finalize_ok("a1", workspace.path(), lock_token, forty_eight_hours_ms))
        .await
        .unwrap();

    let second = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: forty_eight_hours_ms + 1000,
        })
        .await
        .unwrap();
    match second {
        PrepareOutcome::Prepared(p) => {
            assert!(!p.events.iter().any(|e| e.event_type.starts_with("autonomy.task.stale.")));
        }
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    }
}

#[tokio::test]
async fn promote_without_verified_candidates_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    let mut state = eng.load_state("a1", 0).await.unwrap();
    state.augmentation.stage = Stage::Promote;
    for _ in 0..3 {
        state.push_cycle(autonomy_engine::types::CycleRecord {
            ts: 0,
            status: CycleStatus::Ok,
            duration_ms: 5,
        });
    }
    eng.save_state(&state).await.unwrap();

    let outcome = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: 1,
        })
        .await
        .unwrap();
    let lock_token = match outcome {
        PrepareOutcome::Prepared(p) => {
            assert_eq!(p.state.augmentation.stage, Stage::Promote);
            assert!(p
                .state
                .recent_events
                .iter()
                .any(|e| e.event_type == "autonomy.augmentation.policy.denied"));
            p.lock_token
        }
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    };
    eng.finalize(finalize_ok("a1", workspace.path(), lock_token, 1)).await.unwrap();

    let entries = eng.read_ledger("a1", None, 0).await.unwrap();
    assert!(entries.iter().any(|e| e.event_type == LedgerEventType::PolicyDenied
        && e.summary.contains("no verified candidates")));
}

#[tokio::test]
async fn queue_overflow_signal_opens_a_gap_and_advances_to_design() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let eng = Engine::new(dir.path().to_path_buf());

    eng.enqueue_event(
        "a1",
        autonomy_engine::types::EnqueueEventParams {
            source: EventSource::Cron,
            event_type: "queue.overflow".to_string(),
            dedupe_key: Some("queue-overflow-1".to_string()),
            payload: None,
            ts: Some(0),
        },
        0,
    )
    .await
    .unwrap();

    let outcome = eng
        .prepare(PrepareParams {
            agent_id: "a1".to_string(),
            workspace_dir: workspace.path().to_path_buf(),
            config_overrides: None,
            now_ms: 1,
        })
        .await
        .unwrap();

    match outcome {
        PrepareOutcome::Prepared(p) => {
            assert!(!p.state.augmentation.gaps.is_empty());
            assert_eq!(p.state.augmentation.stage, Stage::Design);
            eng.finalize(finalize_ok("a1", workspace.path(), p.lock_token, 1)).await.unwrap();
        }
        PrepareOutcome::Skipped(s) => panic!("expected prepared: {}", s.reason),
    }
}
