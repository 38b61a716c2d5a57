//! Verification probe results, scoring and reports.
//!
//! A `VerificationReport`'s score and level are always derived from its probe
//! list by [`score_probes`] and [`level_for_score`]. They cannot be set
//! independently: the only constructor computes them, and deserialization
//! recomputes them from the stored probes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::VerificationLevel;

/// Number of probe calls in one verification run.
pub const PROBE_COUNT: u32 = 3;

pub const SCHEMA_WEIGHT: f64 = 0.60;
pub const STABILITY_WEIGHT: f64 = 0.25;
pub const LATENCY_WEIGHT: f64 = 0.15;
/// Average latency at which the latency component reaches zero.
pub const LATENCY_CEILING_MS: f64 = 5000.0;

pub const L3_THRESHOLD: f64 = 0.92;
pub const L2_THRESHOLD: f64 = 0.75;
pub const L1_THRESHOLD: f64 = 0.50;

/// Outcome of a single probe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Success,
    Failure,
}

/// One probe call and what was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// 1-based position in the probe sequence.
    pub index: u32,
    pub status: ProbeStatus,
    /// Wall-clock latency in whole milliseconds.
    pub latency_ms: u64,
    /// Whether the response validated against the agent's output schema.
    /// Always false for failed probes.
    pub schema_valid: bool,
    /// Invocation failure or schema violations, in observation order.
    pub errors: Vec<String>,
}

impl ProbeResult {
    pub fn succeeded(&self) -> bool {
        self.status == ProbeStatus::Success
    }
}

/// Aggregates the scoring formula reads from a probe list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeTally {
    pub successful_calls: u32,
    pub schema_matches: u32,
    pub total_latency_ms: u64,
}

impl ProbeTally {
    pub fn from_probes(probes: &[ProbeResult]) -> Self {
        probes.iter().filter(|p| p.succeeded()).fold(
            ProbeTally::default(),
            |mut tally, probe| {
                tally.successful_calls += 1;
                if probe.schema_valid {
                    tally.schema_matches += 1;
                }
                tally.total_latency_ms += probe.latency_ms;
                tally
            },
        )
    }

    /// Mean latency of successful probes; 0 when none succeeded.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.successful_calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / f64::from(self.successful_calls)
        }
    }
}

/// Weighted trust score in `[0, 1]`.
///
/// Schema conformance dominates (60%), then stability (25%), then latency
/// (15%, linear down to zero at 5 seconds). Zero successful probes score 0.
pub fn score_tally(tally: &ProbeTally) -> f64 {
    if tally.successful_calls == 0 {
        return 0.0;
    }
    let probes = f64::from(PROBE_COUNT);
    let schema_score = (f64::from(tally.schema_matches) / probes) * SCHEMA_WEIGHT;
    let stability_score = (f64::from(tally.successful_calls) / probes) * STABILITY_WEIGHT;
    let latency_score =
        (1.0 - tally.avg_latency_ms() / LATENCY_CEILING_MS).max(0.0) * LATENCY_WEIGHT;
    schema_score + stability_score + latency_score
}

pub fn score_probes(probes: &[ProbeResult]) -> f64 {
    score_tally(&ProbeTally::from_probes(probes))
}

pub fn level_for_score(score: f64) -> VerificationLevel {
    if score >= L3_THRESHOLD {
        VerificationLevel::L3
    } else if score >= L2_THRESHOLD {
        VerificationLevel::L2
    } else if score >= L1_THRESHOLD {
        VerificationLevel::L1
    } else {
        VerificationLevel::Unverified
    }
}

/// The result of one verification run, attached to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredReport")]
pub struct VerificationReport {
    score: f64,
    level: VerificationLevel,
    pub probes: Vec<ProbeResult>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn from_probes(probes: Vec<ProbeResult>, recommendations: Vec<String>) -> Self {
        Self::build(probes, recommendations, Utc::now())
    }

    fn build(
        probes: Vec<ProbeResult>,
        recommendations: Vec<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let score = score_probes(&probes);
        Self {
            score,
            level: level_for_score(score),
            probes,
            recommendations,
            generated_at,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn level(&self) -> VerificationLevel {
        self.level
    }

    pub fn tally(&self) -> ProbeTally {
        ProbeTally::from_probes(&self.probes)
    }
}

/// Wire form of a report. Any stored score or level is ignored.
#[derive(Deserialize)]
struct StoredReport {
    probes: Vec<ProbeResult>,
    #[serde(default)]
    recommendations: Vec<String>,
    generated_at: DateTime<Utc>,
}

impl From<StoredReport> for VerificationReport {
    fn from(stored: StoredReport) -> Self {
        VerificationReport::build(stored.probes, stored.recommendations, stored.generated_at)
    }
}
