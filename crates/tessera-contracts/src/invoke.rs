//! Per-call request and result types for the invocation client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentMetrics;

/// One logical call to an agent.
///
/// The target agent is passed alongside the request. The idempotency key is
/// forwarded verbatim; the runtime never deduplicates on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub payload: Value,
    pub idempotency_key: String,
    /// Correlates the calls of one chain execution.
    pub trace_id: Option<String>,
}

impl InvocationRequest {
    pub fn new(payload: Value, idempotency_key: impl Into<String>) -> Self {
        Self {
            payload,
            idempotency_key: idempotency_key.into(),
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// A successful call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Decoded response, with a top-level `data` envelope removed for
    /// direct-convention agents.
    pub response: Value,
    /// Latency of the successful attempt.
    pub latency_ms: u64,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    /// The agent's metrics after this call was folded in. Callers persist it.
    pub metrics: AgentMetrics,
}
