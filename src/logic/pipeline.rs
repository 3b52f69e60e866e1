//! Event Pipeline
//!
//! The single path every sensor finding takes: score, arbitrate, enforce on
//! block, then local log and backend relay. The append-only invariant on the
//! Event (scored once, decided once) holds because this is the only caller of
//! those setters.

use serde_json::json;

use super::decision::{self, Action};
use super::event::{Event, Payload};
use super::response;
use super::{recorder, relay, scoring};

/// Process one sensor finding end to end.
pub fn emit(module: &str, event_type: &str, payload: Payload) {
    let mut event = Event::new(module, event_type, payload);

    scoring::score_event(&mut event);
    let severity = event.severity().unwrap_or(0);

    // Single-line operator alert, visible even when the backend is down
    if severity >= 5 {
        log::warn!(
            "[{}] {} (severity {}): {}",
            module,
            event_type,
            severity,
            event.payload.as_value()
        );
    } else {
        log::info!(
            "[{}] {} (severity {}): {}",
            module,
            event_type,
            severity,
            event.payload.as_value()
        );
    }

    let (action, confidence) = decision::decide(module, event_type, &event);
    event.set_verdict(action, confidence);

    let mut data = event.finalized_data();
    if action == Action::Block {
        let outcome = response::execute(action, &event);
        log::warn!(
            "[{}] enforcement for {}: executed={} ({})",
            module,
            event_type,
            outcome.executed,
            outcome.result
        );
        if let Some(obj) = data.as_object_mut() {
            obj.insert(
                "ml_exec".to_string(),
                json!({"executed": outcome.executed, "result": outcome.result}),
            );
        }
    }

    recorder::append(
        module,
        &json!({
            "event": event_type,
            "data": data,
            "time": event.timestamp.to_rfc3339(),
        }),
    );
    relay::send(module, event_type, data);
}

// ============================================================================
// TESTS
// ============================================================================
