//! Events: the unit of external signal ingestion (§3 "Event").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Cron,
    Webhook,
    Email,
    Subagent,
    Manual,
}

/// One queued or drained event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: EventSource,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    /// Dedupe-key resolution order from §4.1: explicit key, else id, else `source:type`.
    pub fn effective_dedupe_key(&self) -> String {
        if let Some(key) = &self.dedupe_key {
            if !key.trim().is_empty() {
                return key.clone();
            }
        }
        if !self.id.trim().is_empty() {
            return self.id.clone();
        }
        format!("{:?}:{}", self.source, self.event_type)
    }
}

/// Parameters accepted by `Store::enqueue_event`.
#[derive(Debug, Clone)]
pub struct EnqueueEventParams {
    pub source: EventSource,
    pub event_type: String,
    pub dedupe_key: Option<String>,
    pub payload: Option<Value>,
    pub ts: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_dedupe_key_prefers_explicit_key() {
        let event = Event {
            id: "evt-1".into(),
            source: EventSource::Manual,
            event_type: "task.created".into(),
            ts: 0,
            dedupe_key: Some("explicit".into()),
            payload: None,
        };
        assert_eq!(event.effective_dedupe_key(), "explicit");
    }

    #[test]
    fn effective_dedupe_key_falls_back_to_id_then_source_type() {
        let mut event = Event {
            id: "evt-1".into(),
            source: EventSource::Cron,
            event_type: "cron.tick".into(),
            ts: 0,
            dedupe_key: None,
            payload: None,
        };
        assert_eq!(event.effective_dedupe_key(), "evt-1");
        event.id = String::new();
        assert_eq!(event.effective_dedupe_key(), "Cron:cron.tick");
    }
}
