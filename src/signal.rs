//! Maps an event type prefix to a capability-gap signal (§4.2).

use sha1::{Digest, Sha1};

use crate::types::event::Event;
use crate::types::gap::GapCategory;

/// One normalized indication extracted from an event.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: String,
    pub key: String,
    pub title: String,
    pub category: GapCategory,
    pub severity: f64,
    pub confidence: f64,
    pub source: String,
    pub ts: i64,
}

struct Rule {
    matches: fn(&str) -> bool,
    category: GapCategory,
    severity: f64,
    confidence: f64,
}

fn classification_table() -> &'static [Rule] {
    &[
        Rule {
            matches: |t| t.starts_with("queue."),
            category: GapCategory::Reliability,
            severity: 85.0,
            confidence: 0.9,
        },
        Rule {
            matches: |t| t.starts_with("task.stale."),
            category: GapCategory::Capability,
            severity: 70.0,
            confidence: 0.85,
        },
        Rule {
            matches: |t| t.starts_with("review."),
            category: GapCategory::Quality,
            severity: 40.0,
            confidence: 0.6,
        },
        Rule {
            matches: |t| t.contains("security") || t.contains("policy"),
            category: GapCategory::Safety,
            severity: 90.0,
            confidence: 0.8,
        },
        Rule {
            matches: |t| t.contains("timeout") || t.contains("error") || t.contains("failed"),
            category: GapCategory::Reliability,
            severity: 75.0,
            confidence: 0.8,
        },
        Rule {
            matches: |t| t.contains("latency"),
            category: GapCategory::Latency,
            severity: 65.0,
            confidence: 0.65,
        },
        Rule {
            matches: |t| t.contains("cost") || t.contains("budget"),
            category: GapCategory::Cost,
            severity: 55.0,
            confidence: 0.7,
        },
    ]
}

fn classify(event_type: &str) -> (GapCategory, f64, f64) {
    for rule in classification_table() {
        if (rule.matches)(event_type) {
            return (rule.category, rule.severity, rule.confidence);
        }
    }
    (GapCategory::Unknown, 30.0, 0.4)
}

fn derive_title(event: &Event) -> String {
    if let Some(payload) = &event.payload {
        if let Some(title) = payload.get("title").and_then(|v| v.as_str()) {
            if !title.trim().is_empty() {
                return title.to_string();
            }
        }
    }
    event.event_type.replace('.', " ")
}

fn signal_id(dedupe_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(dedupe_key.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Normalize at most one signal per dedupe key out of `events`.
pub fn normalize(events: &[Event]) -> Vec<Signal> {
    let mut seen = std::collections::HashSet::new();
    let mut signals = Vec::new();
    for event in events {
        let key = event.effective_dedupe_key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let (category, severity, confidence) = classify(&event.event_type);
        signals.push(Signal {
            id: signal_id(&key),
            key,
            title: derive_title(event),
            category,
            severity,
            confidence,
            source: format!("{:?}:{}", event.source, event.event_type),
            ts: event.ts,
        });
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::EventSource;
    use serde_json::json;

    fn event(event_type: &str, dedupe_key: Option<&str>) -> Event {
        Event {
            id: "evt-1".into(),
            source: EventSource::Cron,
            event_type: event_type.into(),
            ts: 100,
            dedupe_key: dedupe_key.map(|s| s.to_string()),
            payload: None,
        }
    }

    #[test]
    fn classifies_known_prefixes() {
        let signals = normalize(&[event("queue.overflow", Some("a"))]);
        assert_eq!(signals[0].category, GapCategory::Reliability);
        assert_eq!(signals[0].severity, 85.0);
    }

    #[test]
    fn unknown_prefix_falls_back() {
        let signals = normalize(&[event("widget.created", Some("b"))]);
        assert_eq!(signals[0].category, GapCategory::Unknown);
    }

    #[test]
    fn at_most_one_signal_per_dedupe_key() {
        let signals = normalize(&[event("queue.a", Some("k")), event("queue.b", Some("k"))]);
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn title_prefers_payload_title() {
        let mut e = event("task.stale.blocked", Some("k"));
        e.payload = Some(json!({"title": "Blocked review"}));
        let signals = normalize(&[e]);
        assert_eq!(signals[0].title, "Blocked review");
    }

    #[test]
    fn signal_id_is_sixteen_hex_chars() {
        let signals = normalize(&[event("queue.a", Some("k"))]);
        assert_eq!(signals[0].id.len(), 16);
        assert!(signals[0].id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
