//! Ledger entry shape (§4.10) plus the hash-chain tamper-evidence fields.

use serde::{Deserialize, Serialize};

use crate::phase::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventType {
    PhaseEnter,
    PhaseExit,
    PolicyDenied,
    DiscoveryUpdate,
    CandidateUpdate,
    Promotion,
    Rollback,
}

/// One append-only audit record. `prev_hash`/`entry_hash`/`chain_broken` are
/// an addition over the bare record: a SHA-256 hash chain computed at write
/// time over the entry's canonical JSON (excluding these three fields)
/// concatenated with the previous entry's hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub agent_id: String,
    pub ts: i64,
    pub correlation_id: String,
    pub event_type: LedgerEventType,
    pub stage: Stage,
    pub actor: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,

    pub prev_hash: String,
    pub entry_hash: String,
    #[serde(default)]
    pub chain_broken: bool,
}
