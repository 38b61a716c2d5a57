//! The provenance tracker.
//!
//! For each field `f` with value `v` in a chain's final output, the tracker
//! classifies the field in three passes:
//!
//! 1. **Direct**: the first node (in the order given) whose output has key
//!    `f` with a value equal to `v`. Numbers compare by value, so `1` and
//!    `1.0` are equal.
//! 2. **Transformed**: otherwise, the first `(node, key)` pair, scanning
//!    nodes in order and each node's keys in the order they appear in its
//!    output, where the key is similar to `f` and the value is similar to `v`.
//! 3. **Unknown**: otherwise the field is `synthesized`.
//!
//! Tracing never fails. Every traced map is appended to an in-process index
//! keyed by run id; the index also collects transform records reported for
//! the run and backs the lineage and report queries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    provenance::{
        FieldLineage, FieldOrigin, FieldProvenance, InferenceMethod, NodeOutput, ProvenanceMap,
        ProvenanceReport, ProvenanceSummary, TransformMethod, TransformRecord,
    },
};
use tessera_core::traits::AgentStore;

use crate::confidence::transform_confidence;
use crate::similarity::{json_equal, values_similar, AliasFieldSimilarity, FieldSimilarity};

/// Confidence above which a field counts as high-confidence in a summary.
pub const HIGH_CONFIDENCE: f64 = 0.8;
/// Confidence below which a field counts as low-confidence in a summary.
pub const LOW_CONFIDENCE: f64 = 0.5;

#[derive(Default)]
struct RunEntry {
    map: Option<ProvenanceMap>,
    transforms: Vec<TransformRecord>,
}

pub struct ProvenanceTracker {
    similarity: Arc<dyn FieldSimilarity>,
    index: RwLock<HashMap<String, RunEntry>>,
}

impl Default for ProvenanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvenanceTracker {
    /// A tracker using the built-in alias table.
    pub fn new() -> Self {
        Self::with_similarity(Arc::new(AliasFieldSimilarity::default()))
    }

    pub fn with_similarity(similarity: Arc<dyn FieldSimilarity>) -> Self {
        Self {
            similarity,
            index: RwLock::new(HashMap::new()),
        }
    }

    fn direct_match(field: &str, value: &Value, nodes: &[NodeOutput]) -> Option<FieldProvenance> {
        nodes
            .iter()
            .find(|node| node.output.get(field).is_some_and(|v| json_equal(v, value)))
            .map(|node| FieldProvenance {
                origin: FieldOrigin::Node(node.node_id.clone()),
                method: InferenceMethod::Direct,
                confidence: InferenceMethod::Direct.confidence(),
                transform_chain: vec![node.node_id.clone()],
                timestamp: Utc::now(),
            })
    }

    fn transformed_match(
        &self,
        field: &str,
        value: &Value,
        nodes: &[NodeOutput],
    ) -> Option<FieldProvenance> {
        nodes.iter().find_map(|node| {
            let object = node.output.as_object()?;
            object
                .iter()
                .find(|(key, candidate)| {
                    self.similarity.is_similar(key, field) && values_similar(candidate, value)
                })
                .map(|(key, _)| FieldProvenance {
                    origin: FieldOrigin::Node(node.node_id.clone()),
                    method: InferenceMethod::Transformed,
                    confidence: InferenceMethod::Transformed.confidence(),
                    transform_chain: vec![
                        node.node_id.clone(),
                        format!("rename_{key}_to_{field}"),
                    ],
                    timestamp: Utc::now(),
                })
        })
    }

    fn classify(&self, field: &str, value: &Value, nodes: &[NodeOutput]) -> FieldProvenance {
        Self::direct_match(field, value, nodes)
            .or_else(|| self.transformed_match(field, value, nodes))
            .unwrap_or_else(|| FieldProvenance {
                origin: FieldOrigin::Synthesized,
                method: InferenceMethod::Unknown,
                confidence: InferenceMethod::Unknown.confidence(),
                transform_chain: Vec::new(),
                timestamp: Utc::now(),
            })
    }

    /// Infer the origin of every top-level field of `final_output`.
    ///
    /// A non-object final output has no fields and yields an empty map. The
    /// map is appended to the index under `run_id`; if the run already has a
    /// map, the stored one is kept and the new map is only returned.
    pub fn trace_field_origins(
        &self,
        final_output: &Value,
        nodes: &[NodeOutput],
        run_id: &str,
    ) -> ProvenanceMap {
        let empty = Map::new();
        let fields = final_output.as_object().unwrap_or(&empty);

        let fields: BTreeMap<String, FieldProvenance> = fields
            .iter()
            .map(|(field, value)| (field.clone(), self.classify(field, value, nodes)))
            .collect();

        let map = ProvenanceMap {
            run_id: run_id.to_string(),
            fields,
            created_at: Utc::now(),
        };

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let entry = index.entry(run_id.to_string()).or_default();
        if entry.map.is_some() {
            warn!(run_id, "run already traced; keeping the first provenance map");
        } else {
            entry.map = Some(map.clone());
        }
        drop(index);

        info!(
            run_id,
            fields = map.fields.len(),
            nodes = nodes.len(),
            "field provenance traced"
        );
        map
    }

    /// Trace a run using the node outputs recorded for it in `store`.
    pub async fn trace_run(
        &self,
        store: &dyn AgentStore,
        run_id: &str,
        final_output: &Value,
    ) -> TesseraResult<ProvenanceMap> {
        let nodes = store.node_outputs(run_id).await?;
        debug!(run_id, nodes = nodes.len(), "loaded node outputs");
        Ok(self.trace_field_origins(final_output, &nodes, run_id))
    }

    /// Record an explicit transformation performed by `node_id` during a run.
    pub fn record_transform(
        &self,
        run_id: &str,
        node_id: impl Into<String>,
        method: TransformMethod,
        schema_valid: bool,
        similarity: f64,
    ) -> TransformRecord {
        let record = TransformRecord {
            node_id: node_id.into(),
            method,
            schema_valid,
            similarity,
            confidence: transform_confidence(method, schema_valid, similarity),
            recorded_at: Utc::now(),
        };
        debug!(
            run_id,
            node_id = %record.node_id,
            confidence = record.confidence,
            "transform recorded"
        );
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(run_id.to_string())
            .or_default()
            .transforms
            .push(record.clone());
        record
    }

    fn traced<T>(
        &self,
        run_id: &str,
        f: impl FnOnce(&ProvenanceMap, &[TransformRecord]) -> TesseraResult<T>,
    ) -> TesseraResult<T> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        match index.get(run_id) {
            Some(RunEntry { map: Some(map), transforms }) => f(map, transforms),
            _ => Err(TesseraError::NotFound {
                entity: "provenance run".to_string(),
                id: run_id.to_string(),
            }),
        }
    }

    /// The provenance of one field, with every transform recorded by a node
    /// on the field's chain.
    pub fn field_lineage(&self, run_id: &str, field: &str) -> TesseraResult<FieldLineage> {
        self.traced(run_id, |map, transforms| {
            let provenance = map.get(field).cloned().ok_or_else(|| TesseraError::NotFound {
                entity: "field".to_string(),
                id: field.to_string(),
            })?;
            let transforms = transforms
                .iter()
                .filter(|t| provenance.transform_chain.contains(&t.node_id))
                .cloned()
                .collect();
            Ok(FieldLineage {
                run_id: run_id.to_string(),
                field: field.to_string(),
                provenance,
                transforms,
            })
        })
    }

    /// The stored map for a run, its confidence summary, its transform
    /// records and a digest of the map.
    pub fn export_report(&self, run_id: &str) -> TesseraResult<ProvenanceReport> {
        self.traced(run_id, |map, transforms| {
            Ok(ProvenanceReport {
                run_id: run_id.to_string(),
                summary: summarize(map),
                transforms: transforms.to_vec(),
                digest: map_digest(map)?,
                map: map.clone(),
            })
        })
    }
}

/// Confidence statistics over a map. An empty map summarizes to zeros.
pub fn summarize(map: &ProvenanceMap) -> ProvenanceSummary {
    let confidences: Vec<f64> = map.fields.values().map(|p| p.confidence).collect();
    if confidences.is_empty() {
        return ProvenanceSummary::default();
    }
    ProvenanceSummary {
        field_count: confidences.len(),
        average_confidence: confidences.iter().sum::<f64>() / confidences.len() as f64,
        min_confidence: confidences.iter().copied().fold(f64::INFINITY, f64::min),
        max_confidence: confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        high_confidence_fields: confidences.iter().filter(|c| **c > HIGH_CONFIDENCE).count(),
        low_confidence_fields: confidences.iter().filter(|c| **c < LOW_CONFIDENCE).count(),
    }
}

/// SHA-256 over the canonical (JCS) JSON of the map, as lowercase hex.
pub fn map_digest(map: &ProvenanceMap) -> TesseraResult<String> {
    let bytes = serde_jcs::to_vec(map).map_err(|e| TesseraError::Payload {
        reason: format!("provenance map is not serializable: {e}"),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
