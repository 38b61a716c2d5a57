//! Structural JSON Schema validation.
//!
//! Agents declare input and output schemas as JSON Schema documents. Only
//! structure is checked here (types, required fields, nested properties);
//! business rules inside an agent are out of scope.

use serde_json::Value;
use tracing::warn;

/// Validate `instance` against `schema` and return every violation.
///
/// An empty list means the instance is valid. A `null` schema places no
/// constraint on the instance. A schema document that does not compile is
/// reported as a single violation rather than an error so callers can keep
/// treating the outcome as data.
pub fn schema_violations(schema: &Value, instance: &Value) -> Vec<String> {
    if schema.is_null() {
        return Vec::new();
    }

    match jsonschema::validator_for(schema) {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| format!("schema violation at '{}': {}", error.instance_path, error))
            .collect(),
        Err(e) => {
            let message = format!("invalid JSON Schema document: {e}");
            warn!(%message, "schema compilation failure");
            vec![message]
        }
    }
}

/// Shorthand for `schema_violations(..).is_empty()`.
pub fn conforms(schema: &Value, instance: &Value) -> bool {
    schema_violations(schema, instance).is_empty()
}
