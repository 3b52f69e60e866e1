//! Inference Engine - ONNX Runtime Integration
//!
//! Feature extraction from event payloads and the ONNX session wrapper.

use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use sha2::{Digest, Sha256};

use crate::logic::event::Payload;

/// Width of the feature vector fed to the model
pub const FEATURE_COUNT: usize = 12;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

// ============================================================================
// FEATURE EXTRACTION
// ============================================================================

/// Project an event onto the fixed feature vector the model was trained on.
/// Missing payload fields contribute zero, matching the scorer's defaults.
pub fn extract_features(module: &str, event_type: &str, payload: &Payload) -> [f32; FEATURE_COUNT] {
    let severity = payload.num_get("severity") as f32;
    let uptime = (payload.num_get("uptime") as f32).max(0.0).ln_1p();
    let cpu = payload.num_get("cpu") as f32;
    let duration = payload.num_get("duration") as f32 / 100.0;
    let entropy = payload.num_get("entropy") as f32;
    let port = payload
        .str_get("remote_addr")
        .split(':')
        .nth(1)
        .and_then(|p| p.parse::<f32>().ok())
        .unwrap_or(0.0)
        / 65535.0;
    let trusted = payload.bool_get("trusted", true) as u8 as f32;
    let has_pid = payload.has("pid") as u8 as f32;
    let has_path = (payload.has("path") || payload.has("file")) as u8 as f32;
    let payload_len = payload.len() as f32;

    [
        severity,
        uptime,
        cpu,
        duration,
        entropy,
        port,
        trusted,
        has_pid,
        has_path,
        payload_len,
        hash_bucket(module, 16) as f32 / 16.0,
        hash_bucket(event_type, 32) as f32 / 32.0,
    ]
}

fn hash_bucket(s: &str, buckets: u32) -> u32 {
    let mut h: u32 = 2166136261;
    for b in s.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    h % buckets
}

// ============================================================================
// ONNX PREDICTOR
// ============================================================================

/// Loaded ONNX session plus artifact provenance
pub struct OnnxPredictor {
    session: Session,
}

impl OnnxPredictor {
    /// Load the model from the versioned artifact path
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let session = Session::builder()
            .map_err(|e| InferenceError(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| InferenceError(format!("Failed to load model: {}", e)))?;

        match artifact_digest(path) {
            Ok(digest) => log::info!("Model artifact sha256: {}", digest),
            Err(e) => log::debug!("Could not hash model artifact: {}", e),
        }

        Ok(Self { session })
    }

    /// Run one inference. Returns (label, confidence).
    pub fn predict(&mut self, features: &[f32; FEATURE_COUNT]) -> Result<(i64, f32), InferenceError> {
        let input_array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), features.to_vec())
            .map_err(|e| InferenceError(format!("Array error: {}", e)))?;

        let output_name = self
            .session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| InferenceError("No output defined".to_string()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        let data = output_tensor.1;
        interpret_output(data)
    }
}

/// Map the raw output tensor onto the (label, confidence) contract. A
/// two-class output is argmax + max probability; a single score is thresholded
/// at 0.5.
fn interpret_output(data: &[f32]) -> Result<(i64, f32), InferenceError> {
    match data.len() {
        0 => Err(InferenceError("Empty model output".to_string())),
        1 => {
            let score = data[0].clamp(0.0, 1.0);
            if score >= 0.5 {
                Ok((1, score))
            } else {
                Ok((0, 1.0 - score))
            }
        }
        _ => {
            let mut label = 0usize;
            let mut best = f32::MIN;
            for (i, &v) in data.iter().enumerate() {
                if v > best {
                    best = v;
                    label = i;
                }
            }
            Ok((label as i64, best.clamp(0.0, 1.0)))
        }
    }
}

fn artifact_digest(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_is_total() {
        let features = extract_features("process", "Process Created", &Payload::new());
        assert_eq!(features.len(), FEATURE_COUNT);
        assert!(features.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn test_feature_extraction_is_deterministic() {
        let payload = Payload::new()
            .with("severity", 7)
            .with("uptime", 900)
            .with("remote_addr", "10.0.0.1:1337");
        let a = extract_features("network", "Network Connection", &payload);
        let b = extract_features("network", "Network Connection", &payload);
        assert_eq!(a, b);
    }

    #[test]
    fn test_interpret_two_class_output() {
        let (label, conf) = interpret_output(&[0.2, 0.8]).unwrap();
        assert_eq!(label, 1);
        assert!((conf - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_single_score_output() {
        let (label, conf) = interpret_output(&[0.9]).unwrap();
        assert_eq!(label, 1);
        assert!((conf - 0.9).abs() < 1e-6);

        let (label, conf) = interpret_output(&[0.1]).unwrap();
        assert_eq!(label, 0);
        assert!((conf - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_empty_output_errors() {
        assert!(interpret_output(&[]).is_err());
    }
}
