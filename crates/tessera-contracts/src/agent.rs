//! Agent identity, configuration and rolling metrics.
//!
//! An `Agent` is a registered third-party HTTP endpoint. The runtime only
//! mutates two parts of it: `metrics` (through the invocation client) and the
//! verification fields (through the verification engine).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::verify::VerificationReport;

/// Stable identifier for a registered agent.
///
/// Appears in outbound `X-Agent-Id` headers, bearer token subjects, metrics
/// ledgers and log fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How outbound requests to an agent are authenticated.
///
/// Serialized with an internal `type` tag so manifests read as
/// `{"type": "hmac", "secret_ref": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication header is added.
    None,
    /// Pre-shared key: the canonical body is signed with HMAC-SHA256 using the
    /// secret named by `secret_ref`.
    Hmac { secret_ref: String },
    /// A short-lived HS256 JWT minted with the client's service secret.
    Bearer,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::None
    }
}

/// The wire convention an agent expects for request bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadConvention {
    /// The payload is sent as-is and responses may carry a `data` envelope.
    Direct,
    /// The payload is wrapped as `{body, headers, query}`, merged with the
    /// agent's static fields. Responses are never unwrapped.
    LegacyWebhook {
        #[serde(default)]
        static_fields: Map<String, Value>,
    },
}

impl PayloadConvention {
    pub fn is_legacy_webhook(&self) -> bool {
        matches!(self, PayloadConvention::LegacyWebhook { .. })
    }
}

impl Default for PayloadConvention {
    fn default() -> Self {
        PayloadConvention::Direct
    }
}

/// Trust level derived from a verification run.
///
/// Ordered: `Unverified < L1 < L2 < L3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VerificationLevel {
    #[serde(rename = "unverified")]
    Unverified,
    L1,
    L2,
    L3,
}

impl Default for VerificationLevel {
    fn default() -> Self {
        VerificationLevel::Unverified
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationLevel::Unverified => "unverified",
            VerificationLevel::L1 => "L1",
            VerificationLevel::L2 => "L2",
            VerificationLevel::L3 => "L3",
        };
        f.write_str(s)
    }
}

/// Lifecycle status visible to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered but not (yet) verified above `unverified`.
    Pending,
    /// Verified at L1 or above.
    Active,
}

impl Default for AgentStatus {
    fn default() -> Self {
        AgentStatus::Pending
    }
}

/// Rolling call statistics for one agent.
///
/// This is a value object: `record` returns a new snapshot and never mutates
/// in place. Concurrent writers must serialize through a lock (see the
/// invocation client's metrics ledger).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub call_volume: u64,
    pub success_count: u64,
    pub success_rate: f64,
    /// Running mean latency over every recorded call, in milliseconds.
    pub avg_latency_ms: f64,
    pub last_called_at: Option<DateTime<Utc>>,
}

impl AgentMetrics {
    /// Fold one call outcome into the snapshot.
    ///
    /// The new average weights the prior mean by the prior call count, so the
    /// result equals the arithmetic mean of all samples regardless of order.
    pub fn record(&self, latency_ms: f64, success: bool, at: DateTime<Utc>) -> AgentMetrics {
        let call_volume = self.call_volume + 1;
        let success_count = self.success_count + u64::from(success);
        let prior = self.call_volume as f64;
        let avg_latency_ms = (self.avg_latency_ms * prior + latency_ms) / call_volume as f64;

        AgentMetrics {
            call_volume,
            success_count,
            success_rate: success_count as f64 / call_volume as f64,
            avg_latency_ms,
            last_called_at: Some(at),
        }
    }
}

/// Example traffic an agent declares; `sample_request` drives verification probes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentExamples {
    #[serde(default)]
    pub sample_request: Value,
    #[serde(default)]
    pub sample_response: Value,
}

/// Declared request budget. Informational; the client does not throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
}

/// Hints the agent publishes about how it wants to be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerificationPolicy {
    #[serde(default)]
    pub min_tests: Option<u32>,
    /// Outer deadline applied to each verification probe.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub version: String,
    /// The user who registered the agent.
    pub owner: String,
    pub endpoint: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub convention: PayloadConvention,
    /// JSON-Schema-like document; `null` means unconstrained.
    #[serde(default)]
    pub input_schema: Value,
    /// JSON-Schema-like document; `null` means unconstrained.
    #[serde(default)]
    pub output_schema: Value,
    #[serde(default)]
    pub examples: AgentExamples,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    #[serde(default)]
    pub verification_policy: VerificationPolicy,
    #[serde(default)]
    pub metrics: AgentMetrics,
    #[serde(default)]
    pub verification_level: VerificationLevel,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub verification_report: Option<VerificationReport>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// A freshly registered direct-convention agent with no auth.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.into(),
            version: "0.1.0".to_string(),
            owner: owner.into(),
            endpoint: endpoint.into(),
            auth: AuthConfig::None,
            convention: PayloadConvention::Direct,
            input_schema: Value::Null,
            output_schema: Value::Null,
            examples: AgentExamples::default(),
            rate_limit: None,
            verification_policy: VerificationPolicy::default(),
            metrics: AgentMetrics::default(),
            verification_level: VerificationLevel::Unverified,
            status: AgentStatus::Pending,
            verification_report: None,
            created_at: Utc::now(),
        }
    }
}
