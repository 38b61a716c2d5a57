//! Collaborator trait definitions.
//!
//! These traits are the boundary between the tessera core and the systems it
//! does not own:
//!
//! - `AgentTransport`: moves one request to an agent endpoint
//! - `SecretResolver`: turns a secret reference into key material
//! - `AgentStore`: persists agents and per-run node outputs
//! - `TextOracle`: generative text completion
//!
//! All traits are async and object-safe so engines can hold them as
//! `Arc<dyn _>`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use tessera_contracts::{
    agent::{Agent, AgentId},
    error::TesseraResult,
    provenance::NodeOutput,
};

/// A fully prepared outbound request: final headers and final body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Whatever came back from the endpoint, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Delivers one `POST` to an agent endpoint.
///
/// Implementations return `Ok` for any HTTP response, whatever its status,
/// and reserve `Err` for failures that produced no response (`Transport`,
/// `Timeout`). Per-attempt timeouts and retries belong to the caller.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> TesseraResult<TransportResponse>;
}

/// Resolves secret references (e.g. `agent/summarizer/hmac`) to secret values.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Return the secret, or `TesseraError::Auth` if it cannot be resolved.
    async fn get_secret(&self, name: &str) -> TesseraResult<String>;
}

/// Persistence for agents and chain executions.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load an agent. Missing agents are `TesseraError::NotFound`.
    async fn get_agent(&self, id: &AgentId) -> TesseraResult<Agent>;

    /// Insert or replace an agent.
    async fn put_agent(&self, agent: &Agent) -> TesseraResult<()>;

    /// Append node outputs recorded for a run, preserving order.
    async fn append_node_outputs(
        &self,
        run_id: &str,
        outputs: Vec<NodeOutput>,
    ) -> TesseraResult<()>;

    /// All node outputs recorded for a run, in append order. Unknown runs
    /// yield an empty list.
    async fn node_outputs(&self, run_id: &str) -> TesseraResult<Vec<NodeOutput>>;
}

/// A generative text backend.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> TesseraResult<String>;
}
