//! Per-path write serialization and atomic file writes.
//!
//! Writes to any one file path are serialized in-process: a global registry
//! maps each canonicalized path to its own `tokio::sync::Mutex`, so concurrent
//! callers targeting different files never block each other while callers
//! targeting the same file never interleave. Grounded in the teacher's
//! `Arc<DashMap<..>>` per-key registries; the atomic-write shape (temp file in
//! the same directory, then persist) mirrors its metrics file exporter.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tokio::sync::Mutex;

static PATH_LOCKS: OnceLock<DashMap<PathBuf, Arc<Mutex<()>>>> = OnceLock::new();

fn registry() -> &'static DashMap<PathBuf, Arc<Mutex<()>>> {
    PATH_LOCKS.get_or_init(DashMap::new)
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    registry()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Write `contents` to `path` atomically: a temp file in the same directory,
/// flushed and persisted over the target. Serialized against any other write
/// to the same path.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> std::io::Result<()> {
    let lock = lock_for(path);
    let _guard = lock.lock().await;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&contents)?;
        tmp.flush()?;
        tmp.persist(&path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

/// Append `line` (without trailing newline) to the file at `path`, creating it
/// if absent. Serialized against any other write to the same path.
pub async fn append_line(path: &Path, line: String) -> std::io::Result<()> {
    let lock = lock_for(path);
    let _guard = lock.lock().await;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{\"a\":1}".to_vec()).await.unwrap();
        let read = std::fs::read_to_string(&path).unwrap();
        assert_eq!(read, "{\"a\":1}");
    }

    #[tokio::test]
    async fn append_line_creates_file_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append_line(&path, "{\"id\":1}".to_string()).await.unwrap();
        append_line(&path, "{\"id\":2}".to_string()).await.unwrap();
        let read = std::fs::read_to_string(&path).unwrap();
        assert_eq!(read, "{\"id\":1}\n{\"id\":2}\n");
    }
}
