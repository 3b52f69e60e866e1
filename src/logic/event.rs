//! Canonical Security Event
//!
//! Every sensor emits one of these through the pipeline. Severity and the
//! arbiter's verdict are append-only: set exactly once, never overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::decision::Action;

// ============================================================================
// PAYLOAD
// ============================================================================

/// Open-schema event payload: string keys to JSON scalars.
///
/// Readers go through the typed accessors; a missing numeric field is zero,
/// a missing string is empty, a missing bool is the caller's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn str_get(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn num_get(&self, key: &str) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn int_get(&self, key: &str) -> i64 {
        self.0
            .get(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0)
    }

    pub fn bool_get(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full payload as a JSON object value
    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Lowercased JSON rendering of the whole payload, for keyword rules
    pub fn to_lowercase_string(&self) -> String {
        serde_json::to_string(&self.0)
            .unwrap_or_default()
            .to_lowercase()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// VERDICT
// ============================================================================

/// Arbiter output attached to the event
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Verdict {
    pub action: Action,
    pub confidence: f32,
}

// ============================================================================
// EVENT
// ============================================================================

/// A detected occurrence, scored once and arbitrated once before leaving
/// the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub module: String,
    pub event_type: String,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
    severity: Option<u8>,
    verdict: Option<Verdict>,
}

impl Event {
    pub fn new(module: &str, event_type: &str, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            module: module.to_string(),
            event_type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
            severity: None,
            verdict: None,
        }
    }

    pub fn severity(&self) -> Option<u8> {
        self.severity
    }

    /// Assign the severity. The first assignment wins; later calls are
    /// ignored so a scored event can never be re-scored.
    pub fn set_severity(&mut self, severity: u8) {
        if self.severity.is_none() {
            self.severity = Some(severity.min(10));
        } else {
            log::debug!("severity already set for event {}, ignoring", self.id);
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Assign the arbiter's verdict. First assignment wins.
    pub fn set_verdict(&mut self, action: Action, confidence: f32) {
        if self.verdict.is_none() {
            self.verdict = Some(Verdict { action, confidence });
        } else {
            log::debug!("verdict already set for event {}, ignoring", self.id);
        }
    }

    /// Finalized data object for logging and relay: the payload augmented
    /// with severity and the arbiter fields.
    pub fn finalized_data(&self) -> Value {
        let mut data = match self.payload.as_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(sev) = self.severity {
            data.insert("severity".to_string(), Value::from(sev));
        }
        if let Some(v) = self.verdict {
            data.insert("ml_action".to_string(), Value::from(v.action.as_str()));
            data.insert("ml_confidence".to_string(), Value::from(v.confidence));
        }
        Value::Object(data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let p = Payload::new();
        assert_eq!(p.str_get("missing"), "");
        assert_eq!(p.num_get("missing"), 0.0);
        assert_eq!(p.int_get("missing"), 0);
        assert!(p.bool_get("missing", true));
        assert!(!p.bool_get("missing", false));
    }

    #[test]
    fn test_payload_accessors() {
        let p = Payload::new()
            .with("name", "powershell.exe")
            .with("pid", 1234)
            .with("cpu", 0.5)
            .with("trusted", false);
        assert_eq!(p.str_get("name"), "powershell.exe");
        assert_eq!(p.int_get("pid"), 1234);
        assert_eq!(p.num_get("cpu"), 0.5);
        assert!(!p.bool_get("trusted", true));
    }

    #[test]
    fn test_severity_set_once() {
        let mut event = Event::new("process", "Process Created", Payload::new());
        assert_eq!(event.severity(), None);
        event.set_severity(4);
        event.set_severity(9);
        assert_eq!(event.severity(), Some(4));
    }

    #[test]
    fn test_verdict_set_once() {
        let mut event = Event::new("process", "Process Created", Payload::new());
        event.set_verdict(Action::Alert, 0.6);
        event.set_verdict(Action::Block, 0.9);
        let v = event.verdict().unwrap();
        assert_eq!(v.action, Action::Alert);
        assert!((v.confidence - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_finalized_data_carries_augmentation() {
        let mut event = Event::new(
            "network",
            "Network Connection",
            Payload::new().with("remote_addr", "10.0.0.1:443"),
        );
        event.set_severity(7);
        event.set_verdict(Action::Alert, 0.7);
        let data = event.finalized_data();
        assert_eq!(data["remote_addr"], "10.0.0.1:443");
        assert_eq!(data["severity"], 7);
        assert_eq!(data["ml_action"], "alert");
    }
}
