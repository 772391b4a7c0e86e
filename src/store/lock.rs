//! Per-agent run-lock: in-memory map plus an on-disk `run.lock` file (§5).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LockError;

const LOCK_LIFETIME_MS: i64 = 6 * 60 * 60 * 1000;
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockFile {
    token: String,
    acquired_at: i64,
    expires_at: i64,
}

#[derive(Debug, Clone, Copy)]
struct InMemoryLock {
    expires_at: i64,
}

static IN_MEMORY: OnceLock<DashMap<PathBuf, InMemoryLock>> = OnceLock::new();

fn in_memory() -> &'static DashMap<PathBuf, InMemoryLock> {
    IN_MEMORY.get_or_init(DashMap::new)
}

/// Opaque handle returned by a successful acquire; required to release.
#[derive(Debug, Clone)]
pub struct LockToken {
    pub token: String,
}

/// Acquire the run-lock at `lock_file`, retrying up to [`MAX_ACQUIRE_ATTEMPTS`]
/// times. A live in-memory entry or an unexpired on-disk lock refuses the
/// acquire; a stale on-disk lock is reclaimed.
pub fn acquire(lock_file: &Path, now_ms: i64) -> Result<LockToken, LockError> {
    for attempt in 0..MAX_ACQUIRE_ATTEMPTS {
        if let Some(entry) = in_memory().get(lock_file) {
            if entry.expires_at > now_ms {
                return Err(LockError::Contended);
            }
        }

        if let Ok(contents) = std::fs::read_to_string(lock_file) {
            if let Ok(existing) = serde_json::from_str::<LockFile>(&contents) {
                if existing.expires_at > now_ms {
                    return Err(LockError::Contended);
                }
            }
            // Stale (or unparsable) lock file: best-effort reclaim.
            let _ = std::fs::remove_file(lock_file);
        }

        let token = Uuid::new_v4().to_string();
        let record = LockFile {
            token: token.clone(),
            acquired_at: now_ms,
            expires_at: now_ms + LOCK_LIFETIME_MS,
        };

        if let Some(parent) = lock_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(&record)
            .map_err(|e| LockError::Io(format!("serializing lock record: {e}")))?;

        match std::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(lock_file)
        {
            Ok(mut f) => {
                use std::io::Write;
                f.write_all(json.as_bytes())?;
                in_memory().insert(
                    lock_file.to_path_buf(),
                    InMemoryLock {
                        expires_at: record.expires_at,
                    },
                );
                return Ok(LockToken { token });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if attempt + 1 == MAX_ACQUIRE_ATTEMPTS {
                    return Err(LockError::Contended);
                }
                continue;
            }
            Err(e) => return Err(LockError::from(e)),
        }
    }
    Err(LockError::Contended)
}

/// Release the run-lock; deletes the on-disk file only if its token matches.
pub fn release(lock_file: &Path, token: &LockToken) {
    if let Ok(contents) = std::fs::read_to_string(lock_file) {
        if let Ok(existing) = serde_json::from_str::<LockFile>(&contents) {
            if existing.token == token.token {
                let _ = std::fs::remove_file(lock_file);
            }
        }
    }
    in_memory().remove(lock_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let lock_file = dir.path().join("run.lock");
        let token = acquire(&lock_file, 0).unwrap();
        assert!(lock_file.exists());
        release(&lock_file, &token);
        assert!(!lock_file.exists());
        acquire(&lock_file, 1).unwrap();
    }

    #[test]
    fn contended_lock_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let lock_file = dir.path().join("run.lock");
        let _token = acquire(&lock_file, 0).unwrap();
        let err = acquire(&lock_file, 1).unwrap_err();
        assert!(matches!(err, LockError::Contended));
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let lock_file = dir.path().join("run.lock");
        let _token = acquire(&lock_file, 0).unwrap();
        // Far past the 6h lifetime; a fresh acquire call (new process view)
        // should reclaim it.
        in_memory().remove(&lock_file);
        let far_future = LOCK_LIFETIME_MS + 10;
        acquire(&lock_file, far_future).unwrap();
    }
}
