//! Decision Arbiter
//!
//! Two-tier logic: the ML predictor's confidence when it is available, a
//! deterministic severity fallback when it is not. Invoked exactly once per
//! event, after scoring.

use serde::{Deserialize, Serialize};

use super::event::Event;
use super::model;

/// Confidence at or above which the ML tier blocks
pub const HIGH_THRESHOLD: f32 = 0.8;

/// Confidence at or above which the ML tier alerts
pub const LOW_THRESHOLD: f32 = 0.4;

/// Severity at or above which the fallback tier blocks
const BLOCK_SEVERITY: u8 = 8;

/// Severity at or above which the fallback tier alerts
const ALERT_SEVERITY: u8 = 5;

// ============================================================================
// ACTION
// ============================================================================

/// Arbitrated response for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Log,
    Alert,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Log => "log",
            Action::Alert => "alert",
            Action::Block => "block",
        }
    }
}

// ============================================================================
// ARBITER
// ============================================================================

/// Decide the action for a scored event. Returns the action and the
/// confidence of whichever tier produced it.
pub fn decide(module: &str, event_type: &str, event: &Event) -> (Action, f32) {
    match model::predict(module, event_type, &event.payload) {
        Ok((_label, confidence)) => confidence_tier(confidence),
        Err(e) => {
            log::debug!("Realtime prediction unavailable ({}), using severity fallback", e);
            severity_fallback(event.severity().unwrap_or(0))
        }
    }
}

fn confidence_tier(confidence: f32) -> (Action, f32) {
    if confidence >= HIGH_THRESHOLD {
        (Action::Block, confidence)
    } else if confidence >= LOW_THRESHOLD {
        (Action::Alert, confidence)
    } else {
        (Action::Log, confidence)
    }
}

/// Severity-only decision used whenever the predictor cannot answer
pub fn severity_fallback(severity: u8) -> (Action, f32) {
    let confidence = severity as f32 / 10.0;
    if severity >= BLOCK_SEVERITY {
        (Action::Block, confidence)
    } else if severity >= ALERT_SEVERITY {
        (Action::Alert, confidence)
    } else {
        (Action::Log, confidence)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::event::Payload;

    #[test]
    fn test_fallback_tiers() {
        let (action, conf) = severity_fallback(9);
        assert_eq!(action, Action::Block);
        assert!((conf - 0.9).abs() < f32::EPSILON);

        let (action, conf) = severity_fallback(6);
        assert_eq!(action, Action::Alert);
        assert!((conf - 0.6).abs() < f32::EPSILON);

        let (action, conf) = severity_fallback(2);
        assert_eq!(action, Action::Log);
        assert!((conf - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fallback_boundaries() {
        assert_eq!(severity_fallback(8).0, Action::Block);
        assert_eq!(severity_fallback(7).0, Action::Alert);
        assert_eq!(severity_fallback(5).0, Action::Alert);
        assert_eq!(severity_fallback(4).0, Action::Log);
        assert_eq!(severity_fallback(0).0, Action::Log);
    }

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(confidence_tier(0.95).0, Action::Block);
        assert_eq!(confidence_tier(0.8).0, Action::Block);
        assert_eq!(confidence_tier(0.5).0, Action::Alert);
        assert_eq!(confidence_tier(0.4).0, Action::Alert);
        assert_eq!(confidence_tier(0.1).0, Action::Log);
    }

    #[test]
    fn test_decide_without_model_uses_severity() {
        // No model artifact in the test environment, so the predictor pins
        // itself unavailable and decide() must take the fallback path.
        let mut event = Event::new("process", "Process Created", Payload::new());
        event.set_severity(9);
        let (action, conf) = decide("process", "Process Created", &event);
        assert_eq!(action, Action::Block);
        assert!((conf - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(Action::Block.as_str(), "block");
        let json = serde_json::to_string(&Action::Alert).unwrap();
        assert_eq!(json, "\"alert\"");
    }
}
