//! Dedupe-map admission and pruning (§3 `dedupe`, §4.1 `DrainEvents`).

use std::collections::HashMap;

use crate::types::state::{DEDUPE_PRUNE_MULTIPLIER, MAX_DEDUPE_ENTRIES};

/// Admit `key` at `now_ms` if it has not been seen within `window_ms`.
/// Returns `true` if the event should be admitted (and records the key).
pub fn admit(dedupe: &mut HashMap<String, i64>, key: &str, now_ms: i64, window_ms: i64) -> bool {
    if let Some(last) = dedupe.get(key) {
        if *last + window_ms > now_ms {
            return false;
        }
    }
    dedupe.insert(key.to_string(), now_ms);
    true
}

/// Prune entries older than `window_ms * DEDUPE_PRUNE_MULTIPLIER`, then, if
/// still over [`MAX_DEDUPE_ENTRIES`], evict the oldest by timestamp.
pub fn prune(dedupe: &mut HashMap<String, i64>, now_ms: i64, window_ms: i64) {
    let stale_before = now_ms - window_ms * DEDUPE_PRUNE_MULTIPLIER;
    dedupe.retain(|_, ts| *ts >= stale_before);

    if dedupe.len() > MAX_DEDUPE_ENTRIES {
        let mut entries: Vec<(String, i64)> =
            dedupe.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by_key(|(_, ts)| *ts);
        let overflow = dedupe.len() - MAX_DEDUPE_ENTRIES;
        for (key, _) in entries.into_iter().take(overflow) {
            dedupe.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_rejects_repeat_within_window() {
        let mut dedupe = HashMap::new();
        assert!(admit(&mut dedupe, "k", 0, 1000));
        assert!(!admit(&mut dedupe, "k", 500, 1000));
        assert!(admit(&mut dedupe, "k", 1500, 1000));
    }

    #[test]
    fn prune_drops_entries_past_multiplied_window() {
        let mut dedupe = HashMap::new();
        dedupe.insert("old".to_string(), 0);
        dedupe.insert("fresh".to_string(), 2900);
        prune(&mut dedupe, 3000, 1000);
        assert!(!dedupe.contains_key("old"));
        assert!(dedupe.contains_key("fresh"));
    }

    #[test]
    fn prune_evicts_oldest_past_cap() {
        let mut dedupe = HashMap::new();
        for i in 0..(MAX_DEDUPE_ENTRIES + 5) {
            dedupe.insert(format!("k{i}"), i as i64);
        }
        prune(&mut dedupe, (MAX_DEDUPE_ENTRIES + 5) as i64, 1_000_000_000);
        assert_eq!(dedupe.len(), MAX_DEDUPE_ENTRIES);
        assert!(!dedupe.contains_key("k0"));
    }
}
