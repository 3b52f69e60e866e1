//! Model Module - Realtime ML Predictor
//!
//! One-shot initialization behind a three-state tag: the ONNX artifact is
//! loaded at most once per process run, and a load failure permanently
//! downgrades every later decision to the severity fallback. No retries.

pub mod inference;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use self::inference::{InferenceError, OnnxPredictor};
use super::event::Payload;
use crate::constants;

// ============================================================================
// STATE
// ============================================================================

enum PredictorState {
    Uninitialized,
    Ready(OnnxPredictor),
    Unavailable,
}

static STATE: Lazy<RwLock<PredictorState>> =
    Lazy::new(|| RwLock::new(PredictorState::Uninitialized));

/// Capability tag exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Uninitialized,
    Ready,
    Unavailable,
}

// ============================================================================
// GLOBAL API
// ============================================================================

/// Attempt the one-shot model load if it has not happened yet.
pub fn ensure_init() {
    let mut state = STATE.write();
    if !matches!(*state, PredictorState::Uninitialized) {
        return;
    }

    let path = constants::model_path();
    if !path.exists() {
        log::info!("Model artifact not found at {:?} - using fallback decisions", path);
        *state = PredictorState::Unavailable;
        return;
    }

    match OnnxPredictor::load(&path) {
        Ok(predictor) => {
            log::info!("Realtime ML model loaded from {:?}", path);
            *state = PredictorState::Ready(predictor);
        }
        Err(e) => {
            log::warn!("Failed to load realtime model: {} - agent will continue without ML predictions", e);
            *state = PredictorState::Unavailable;
        }
    }
}

/// Current capability without forcing initialization
pub fn availability() -> Availability {
    match *STATE.read() {
        PredictorState::Uninitialized => Availability::Uninitialized,
        PredictorState::Ready(_) => Availability::Ready,
        PredictorState::Unavailable => Availability::Unavailable,
    }
}

/// Run the predictor on an event. Errors when the model is unavailable or
/// inference fails; the caller falls back to severity.
pub fn predict(
    module: &str,
    event_type: &str,
    payload: &Payload,
) -> Result<(i64, f32), InferenceError> {
    ensure_init();

    let mut state = STATE.write();
    match &mut *state {
        PredictorState::Ready(predictor) => {
            let features = inference::extract_features(module, event_type, payload);
            predictor.predict(&features)
        }
        _ => Err(InferenceError("model unavailable".to_string())),
    }
}
