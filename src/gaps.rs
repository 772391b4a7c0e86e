//! Upsert and ranking for the gap registry (§4.3).

use crate::signal::Signal;
use crate::types::gap::{Gap, GapStatus};

fn freshness_hours(last_seen_at: i64, now_ms: i64) -> f64 {
    ((now_ms - last_seen_at).max(0) as f64) / (60.0 * 60.0 * 1000.0)
}

fn score(severity: f64, confidence: f64, last_seen_at: i64, occurrences: u32, now_ms: i64) -> i64 {
    let freshness = (24.0 - freshness_hours(last_seen_at, now_ms)).clamp(0.0, 24.0);
    let value = 0.55 * severity
        + 0.25 * confidence * 100.0
        + 0.2 * freshness
        + 0.5 * (occurrences.min(20) as f64);
    value.round() as i64
}

/// Apply one signal to the gap registry: update a matching gap or create one.
pub fn upsert(gaps: &mut Vec<Gap>, signal: &Signal, now_ms: i64) {
    if let Some(gap) = gaps.iter_mut().find(|g| g.key == signal.key) {
        gap.title = signal.title.clone();
        gap.category = signal.category;
        gap.last_source = signal.source.clone();
        gap.occurrences += 1;
        gap.last_seen_at = gap.last_seen_at.max(signal.ts);
        gap.severity = 0.65 * gap.severity + 0.35 * signal.severity;
        gap.confidence = 0.7 * gap.confidence + 0.3 * signal.confidence;
        gap.push_evidence(signal.id.clone());
        gap.score = score(
            gap.severity,
            gap.confidence,
            gap.last_seen_at,
            gap.occurrences,
            now_ms,
        );
    } else {
        let mut gap = Gap {
            id: signal.id.clone(),
            key: signal.key.clone(),
            title: signal.title.clone(),
            category: signal.category,
            status: GapStatus::Open,
            severity: signal.severity,
            confidence: signal.confidence,
            score: 0,
            occurrences: 1,
            first_seen_at: signal.ts,
            last_seen_at: signal.ts,
            last_source: signal.source.clone(),
            evidence: Vec::new(),
        };
        gap.push_evidence(signal.id.clone());
        gap.score = score(gap.severity, gap.confidence, gap.last_seen_at, gap.occurrences, now_ms);
        gaps.push(gap);
    }
}

/// Sort by descending score, then descending recency, then ascending key;
/// truncate to the registry cap.
pub fn rerank(gaps: &mut Vec<Gap>) {
    gaps.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.last_seen_at.cmp(&a.last_seen_at))
            .then(a.key.cmp(&b.key))
    });
    if gaps.len() > Gap::MAX_GAPS {
        gaps.truncate(Gap::MAX_GAPS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::gap::GapCategory;

    fn signal(key: &str, severity: f64, confidence: f64, ts: i64) -> Signal {
        Signal {
            id: format!("id-{key}"),
            key: key.to_string(),
            title: format!("title-{key}"),
            category: GapCategory::Reliability,
            severity,
            confidence,
            source: "cron:tick".into(),
            ts,
        }
    }

    #[test]
    fn upsert_creates_new_open_gap() {
        let mut gaps = Vec::new();
        upsert(&mut gaps, &signal("k1", 80.0, 0.9, 1000), 1000);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].status, GapStatus::Open);
        assert_eq!(gaps[0].occurrences, 1);
    }

    #[test]
    fn upsert_blends_existing_gap() {
        let mut gaps = Vec::new();
        upsert(&mut gaps, &signal("k1", 80.0, 0.9, 1000), 1000);
        upsert(&mut gaps, &signal("k1", 40.0, 0.5, 2000), 2000);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].occurrences, 2);
        let expected_severity = 0.65 * 80.0 + 0.35 * 40.0;
        assert!((gaps[0].severity - expected_severity).abs() < 1e-9);
    }

    #[test]
    fn rerank_sorts_by_score_then_recency_then_key() {
        let mut gaps = Vec::new();
        upsert(&mut gaps, &signal("b", 10.0, 0.1, 1000), 1000);
        upsert(&mut gaps, &signal("a", 90.0, 0.9, 1000), 1000);
        rerank(&mut gaps);
        assert_eq!(gaps[0].key, "a");
    }

    #[test]
    fn rerank_truncates_to_cap() {
        let mut gaps = Vec::new();
        for i in 0..(Gap::MAX_GAPS + 10) {
            upsert(&mut gaps, &signal(&format!("k{i}"), 10.0, 0.1, i as i64), i as i64);
        }
        rerank(&mut gaps);
        assert_eq!(gaps.len(), Gap::MAX_GAPS);
    }
}
