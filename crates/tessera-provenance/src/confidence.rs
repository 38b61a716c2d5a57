//! Confidence model for explicit transformation steps.

use tessera_contracts::provenance::TransformMethod;

/// Multiplier applied when a transformation's output failed schema validation.
pub const SCHEMA_FAILURE_PENALTY: f64 = 0.7;

/// `base(method) × (0.7 if schema invalid) × (0.5 + similarity × 0.5)`,
/// clamped to `[0, 1]`. `similarity` is clamped to `[0, 1]` first; a NaN
/// similarity counts as zero.
pub fn transform_confidence(method: TransformMethod, schema_valid: bool, similarity: f64) -> f64 {
    let similarity = if similarity.is_nan() { 0.0 } else { similarity.clamp(0.0, 1.0) };
    let mut confidence = method.base_confidence();
    if !schema_valid {
        confidence *= SCHEMA_FAILURE_PENALTY;
    }
    (confidence * (0.5 + similarity * 0.5)).clamp(0.0, 1.0)
}
