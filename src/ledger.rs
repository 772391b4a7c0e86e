//! Append-only, hash-chained audit ledger (§4.10).

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::fswrite;
use crate::phase::Stage;
use crate::types::ledger::{LedgerEntry, LedgerEventType};

const GENESIS_HASH: &str = "";

/// Fields hashed for one entry: every field except the hash-chain fields
/// themselves, serialized canonically (stable field order from the struct).
#[derive(Serialize)]
struct Hashable<'a> {
    id: &'a str,
    agent_id: &'a str,
    ts: i64,
    correlation_id: &'a str,
    event_type: LedgerEventType,
    stage: Stage,
    actor: &'a str,
    summary: &'a str,
    evidence: &'a Option<serde_json::Value>,
}

fn entry_hash(entry: &LedgerEntry, prev_hash: &str) -> Result<String, LedgerError> {
    let hashable = Hashable {
        id: &entry.id,
        agent_id: &entry.agent_id,
        ts: entry.ts,
        correlation_id: &entry.correlation_id,
        event_type: entry.event_type,
        stage: entry.stage,
        actor: &entry.actor,
        summary: &entry.summary,
        evidence: &entry.evidence,
    };
    let canonical = serde_json::to_string(&hashable)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Append one entry to the ledger at `path`, chaining its hash onto the
/// current last entry's hash (or the genesis hash if the ledger is empty).
pub async fn append(
    path: &Path,
    mut entry: LedgerEntry,
    now_ms: i64,
) -> Result<LedgerEntry, LedgerError> {
    if entry.id.is_empty() {
        entry.id = uuid::Uuid::new_v4().to_string();
    }
    if entry.ts == 0 {
        entry.ts = now_ms;
    }

    let prev_hash = last_hash(path).await?.unwrap_or_else(|| GENESIS_HASH.to_string());
    entry.prev_hash = prev_hash.clone();
    entry.entry_hash = entry_hash(&entry, &prev_hash)?;
    entry.chain_broken = false;

    let line = serde_json::to_string(&entry)?;
    fswrite::append_line(path, line).await?;
    Ok(entry)
}

async fn last_hash(path: &Path) -> Result<Option<String>, LedgerError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LedgerError::from(e)),
    };
    let last_valid = raw
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<LedgerEntry>(line).ok());
    Ok(last_valid.map(|e| e.entry_hash))
}

/// Read entries, tolerating malformed/truncated lines. Flags `chain_broken`
/// on any entry (and all subsequent ones) whose hash fails to verify against
/// its recorded predecessor; never fails the read.
pub async fn read(
    path: &Path,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::from(e)),
    };

    let mut entries: Vec<LedgerEntry> = Vec::new();
    let mut prev_hash = GENESIS_HASH.to_string();
    let mut chain_already_broken = false;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(mut entry) = serde_json::from_str::<LedgerEntry>(line) else {
            continue;
        };

        let expected = entry_hash(&entry, &prev_hash).unwrap_or_default();
        let matches_chain = entry.prev_hash == prev_hash && entry.entry_hash == expected;
        if !matches_chain {
            chain_already_broken = true;
        }
        entry.chain_broken = chain_already_broken;

        prev_hash = entry.entry_hash.clone();
        entries.push(entry);
    }

    entries.sort_by(|a, b| b.ts.cmp(&a.ts));

    let start = offset.min(entries.len());
    let end = match limit {
        Some(l) => (start + l).min(entries.len()),
        None => entries.len(),
    };
    Ok(entries[start..end].to_vec())
}
