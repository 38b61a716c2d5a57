//! Field-level provenance types.
//!
//! A `ProvenanceMap` records, for every field of a chain's final output,
//! which upstream node it was inferred to come from and how confident the
//! inference is. Confidence values are always within `[0, 1]`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The recorded output of one node in a chain execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub node_id: String,
    pub output: Value,
}

impl NodeOutput {
    pub fn new(node_id: impl Into<String>, output: Value) -> Self {
        Self {
            node_id: node_id.into(),
            output,
        }
    }
}

/// Where a field's value was inferred to come from.
///
/// Serialized as a bare string: the node id, or `"synthesized"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldOrigin {
    Node(String),
    Synthesized,
}

impl FieldOrigin {
    pub const SYNTHESIZED: &'static str = "synthesized";

    pub fn node_id(&self) -> Option<&str> {
        match self {
            FieldOrigin::Node(id) => Some(id),
            FieldOrigin::Synthesized => None,
        }
    }
}

impl From<String> for FieldOrigin {
    fn from(s: String) -> Self {
        if s == FieldOrigin::SYNTHESIZED {
            FieldOrigin::Synthesized
        } else {
            FieldOrigin::Node(s)
        }
    }
}

impl From<FieldOrigin> for String {
    fn from(origin: FieldOrigin) -> Self {
        match origin {
            FieldOrigin::Node(id) => id,
            FieldOrigin::Synthesized => FieldOrigin::SYNTHESIZED.to_string(),
        }
    }
}

impl fmt::Display for FieldOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOrigin::Node(id) => f.write_str(id),
            FieldOrigin::Synthesized => f.write_str(FieldOrigin::SYNTHESIZED),
        }
    }
}

/// How an origin was inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMethod {
    /// Same key, identical value in a node output.
    Direct,
    /// Similar key and similar value in a node output.
    Transformed,
    /// No node output matched.
    Unknown,
}

impl InferenceMethod {
    /// Confidence assigned to a field inferred by this method.
    pub fn confidence(self) -> f64 {
        match self {
            InferenceMethod::Direct => 1.0,
            InferenceMethod::Transformed => 0.8,
            InferenceMethod::Unknown => 0.3,
        }
    }
}

/// Provenance for one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub origin: FieldOrigin,
    pub method: InferenceMethod,
    pub confidence: f64,
    /// Ordered step descriptors, e.g. `["node-a", "rename_title_to_name"]`.
    pub transform_chain: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Field provenance for one chain execution. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceMap {
    pub run_id: String,
    pub fields: BTreeMap<String, FieldProvenance>,
    pub created_at: DateTime<Utc>,
}

impl ProvenanceMap {
    pub fn get(&self, field: &str) -> Option<&FieldProvenance> {
        self.fields.get(field)
    }
}

/// How an explicit transformation step produced its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformMethod {
    DeterministicMapping,
    MappingHint,
    GraphAttentionAssisted,
    Generative,
}

impl TransformMethod {
    pub fn base_confidence(self) -> f64 {
        match self {
            TransformMethod::DeterministicMapping => 0.95,
            TransformMethod::MappingHint => 0.85,
            TransformMethod::GraphAttentionAssisted => 0.75,
            TransformMethod::Generative => 0.60,
        }
    }
}

/// An explicit transformation reported by chain-execution instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    /// The node that performed the transformation.
    pub node_id: String,
    pub method: TransformMethod,
    /// Whether the transformation output passed schema validation.
    pub schema_valid: bool,
    /// Caller-supplied input/output relatedness estimate in `[0, 1]`.
    pub similarity: f64,
    /// Derived from `method`, `schema_valid` and `similarity`.
    pub confidence: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Confidence statistics over one provenance map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProvenanceSummary {
    pub field_count: usize,
    pub average_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Fields with confidence strictly above 0.8.
    pub high_confidence_fields: usize,
    /// Fields with confidence strictly below 0.5.
    pub low_confidence_fields: usize,
}

/// Everything recorded for one run, exported for consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceReport {
    pub run_id: String,
    pub map: ProvenanceMap,
    pub summary: ProvenanceSummary,
    pub transforms: Vec<TransformRecord>,
    /// SHA-256 hex digest of the map's canonical JSON.
    pub digest: String,
}

/// The provenance of one field plus the transforms its chain passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLineage {
    pub run_id: String,
    pub field: String,
    pub provenance: FieldProvenance,
    pub transforms: Vec<TransformRecord>,
}
