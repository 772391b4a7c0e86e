//! Per-agent directory layout under the state root (§6 Filesystem layout).

use std::path::{Path, PathBuf};

use crate::types::ids::normalize_agent_id;

const STATE_ROOT_ENV: &str = "AUTONOMY_STATE_ROOT";
const DEFAULT_STATE_ROOT: &str = "autonomy";

/// Resolve the state root: `AUTONOMY_STATE_ROOT` env var if set, else
/// `<config_root>/autonomy`.
pub fn state_root(config_root: &Path) -> PathBuf {
    if let Ok(root) = std::env::var(STATE_ROOT_ENV) {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }
    config_root.join(DEFAULT_STATE_ROOT)
}

/// Per-agent directory: `<state_root>/<normalized-agent-id>`.
pub fn agent_dir(config_root: &Path, agent_id: &str) -> PathBuf {
    state_root(config_root).join(normalize_agent_id(agent_id))
}

pub struct AgentPaths {
    pub dir: PathBuf,
    pub state_file: PathBuf,
    pub backup_file: PathBuf,
    pub events_file: PathBuf,
    pub ledger_file: PathBuf,
    pub lock_file: PathBuf,
}

impl AgentPaths {
    pub fn new(config_root: &Path, agent_id: &str) -> Self {
        let dir = agent_dir(config_root, agent_id);
        Self {
            state_file: dir.join("state.json"),
            backup_file: dir.join("state.backup.json"),
            events_file: dir.join("events.jsonl"),
            ledger_file: dir.join("augmentation-ledger.jsonl"),
            lock_file: dir.join("run.lock"),
            dir,
        }
    }
}
