//! # tessera-provenance
//!
//! Field-level provenance for chain executions.
//!
//! [`tracker::ProvenanceTracker`] inspects a chain's final output after the
//! run completes and infers, for each field, which upstream node produced it
//! (`direct`, `transformed` or `unknown`) with a confidence score. Traced maps
//! are kept in an append-only index keyed by run id, alongside any explicit
//! transform records reported during the run.
//!
//! Field-name matching is pluggable through [`similarity::FieldSimilarity`];
//! the default [`similarity::AliasFieldSimilarity`] combines case folding,
//! containment and a small alias table.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tessera_provenance::ProvenanceTracker;
//!
//! let tracker = ProvenanceTracker::new();
//! let map = tracker.trace_field_origins(&final_output, &node_outputs, "run-1");
//! let report = tracker.export_report("run-1")?;
//! println!("{} fields, digest {}", report.summary.field_count, report.digest);
//! ```

pub mod confidence;
pub mod similarity;
pub mod tracker;

pub use similarity::{AliasFieldSimilarity, FieldSimilarity};
pub use tracker::ProvenanceTracker;
