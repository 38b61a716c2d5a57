//! Agent capability manifest.
//!
//! Agents publish a manifest at [`DISCOVERY_PATH`]. The manifest carries the
//! auth *kind* only; secrets never appear in it. When a manifest is turned
//! into an `Agent`, HMAC agents get a conventional secret reference derived
//! from their id.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{
    Agent, AgentExamples, AgentId, AgentMetrics, AgentStatus, AuthConfig, PayloadConvention,
    RateLimit, VerificationLevel, VerificationPolicy,
};

/// Well-known path, relative to an agent's base URL, where its manifest lives.
pub const DISCOVERY_PATH: &str = "/.well-known/agent.json";

/// Auth kind as advertised in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestAuthKind {
    None,
    Hmac,
    Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAuth {
    #[serde(rename = "type")]
    pub kind: ManifestAuthKind,
}

/// The JSON document an agent publishes to describe itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
    pub auth: ManifestAuth,
    #[serde(default)]
    pub examples: AgentExamples,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    #[serde(default)]
    pub verification_policy: VerificationPolicy,
    #[serde(default)]
    pub convention: PayloadConvention,
}

/// Secret name used for HMAC agents registered from a manifest.
pub fn default_hmac_secret_ref(agent_id: &str) -> String {
    format!("agent/{agent_id}/hmac")
}

impl AgentManifest {
    /// Register the manifest as a new, unverified agent.
    pub fn into_agent(self, endpoint: impl Into<String>, owner: impl Into<String>) -> Agent {
        let auth = match self.auth.kind {
            ManifestAuthKind::None => AuthConfig::None,
            ManifestAuthKind::Hmac => AuthConfig::Hmac {
                secret_ref: default_hmac_secret_ref(&self.id),
            },
            ManifestAuthKind::Bearer => AuthConfig::Bearer,
        };

        Agent {
            id: AgentId(self.id),
            name: self.name,
            version: self.version,
            owner: owner.into(),
            endpoint: endpoint.into(),
            auth,
            convention: self.convention,
            input_schema: self.input_schema,
            output_schema: self.output_schema,
            examples: self.examples,
            rate_limit: self.rate_limit,
            verification_policy: self.verification_policy,
            metrics: AgentMetrics::default(),
            verification_level: VerificationLevel::Unverified,
            status: AgentStatus::Pending,
            verification_report: None,
            created_at: Utc::now(),
        }
    }
}

impl Agent {
    /// The manifest this agent would publish.
    pub fn manifest(&self) -> AgentManifest {
        let kind = match self.auth {
            AuthConfig::None => ManifestAuthKind::None,
            AuthConfig::Hmac { .. } => ManifestAuthKind::Hmac,
            AuthConfig::Bearer => ManifestAuthKind::Bearer,
        };

        AgentManifest {
            id: self.id.0.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            auth: ManifestAuth { kind },
            examples: self.examples.clone(),
            rate_limit: self.rate_limit,
            verification_policy: self.verification_policy,
            convention: self.convention.clone(),
        }
    }
}
