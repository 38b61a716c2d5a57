//! The agent invocation client.
//!
//! One call runs the following pipeline:
//!
//!   Input shape → Headers → Payload adaptation → Canonical body → Auth → Attempts
//!
//! Auth and payload failures happen before the first attempt and are fatal.
//! Attempts are bounded at `max_retries + 1`; after failed attempt `n` the
//! client waits `retry_delay * n`. A 429 is retried like any other transient
//! failure but stays visible as `Http { status: 429 }` in the final error.
//! Exactly one metrics update is recorded per call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use tessera_contracts::{
    agent::{Agent, AgentId, AgentMetrics},
    error::{TesseraError, TesseraResult},
    invoke::{Invocation, InvocationRequest},
};
use tessera_core::{
    schema::schema_violations,
    traits::{AgentTransport, OutboundRequest, SecretResolver, TransportResponse},
};

use crate::{
    auth::AuthResolver,
    config::ClientConfig,
    metrics::MetricsLedger,
    payload::{adapt_payload, canonical_bytes, decode_body, unwrap_response},
    transport::HttpTransport,
};

pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const USER_AGENT_HEADER: &str = "user-agent";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Calls agents with their auth scheme and wire convention, applying the
/// timeout and retry policy from `ClientConfig`.
///
/// The client is cheap to share behind an `Arc`; concurrent calls only
/// contend on the metrics entry of the agent they target.
pub struct AgentClient {
    config: ClientConfig,
    transport: Arc<dyn AgentTransport>,
    auth: AuthResolver,
    ledger: MetricsLedger,
}

impl AgentClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn AgentTransport>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        let auth = AuthResolver::new(secrets, &config);
        Self {
            config,
            transport,
            auth,
            ledger: MetricsLedger::new(),
        }
    }

    /// A client over the reqwest transport.
    pub fn http(config: ClientConfig, secrets: Arc<dyn SecretResolver>) -> TesseraResult<Self> {
        Ok(Self::new(config, Arc::new(HttpTransport::new()?), secrets))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The client's current metrics for an agent, including failed calls.
    pub fn metrics(&self, agent_id: &AgentId) -> Option<AgentMetrics> {
        self.ledger.snapshot(agent_id)
    }

    fn base_headers(&self, agent: &Agent, request: &InvocationRequest) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), "application/json".to_string());
        headers.insert(IDEMPOTENCY_HEADER.to_string(), request.idempotency_key.clone());
        headers.insert(AGENT_ID_HEADER.to_string(), agent.id.0.clone());
        headers.insert(USER_AGENT_HEADER.to_string(), self.config.client_identity.clone());
        if let Some(trace_id) = &request.trace_id {
            headers.insert(TRACE_ID_HEADER.to_string(), trace_id.clone());
        }
        headers
    }

    /// Build the exact request that every attempt will send.
    async fn prepare(
        &self,
        agent: &Agent,
        request: &InvocationRequest,
    ) -> TesseraResult<OutboundRequest> {
        let violations = schema_violations(&agent.input_schema, &request.payload);
        if !violations.is_empty() {
            return Err(TesseraError::Payload {
                reason: violations.join("; "),
            });
        }

        let mut headers = self.base_headers(agent, request);
        let body = adapt_payload(&agent.convention, &request.payload, &headers);
        let body = canonical_bytes(&body)?;
        headers.extend(self.auth.headers(agent, &body).await?);

        Ok(OutboundRequest {
            url: agent.endpoint.clone(),
            headers,
            body,
        })
    }

    async fn attempt(&self, request: OutboundRequest) -> TesseraResult<TransportResponse> {
        match tokio::time::timeout(self.config.timeout(), self.transport.post(request)).await {
            Ok(result) => result,
            Err(_) => Err(TesseraError::Timeout {
                elapsed_ms: self.config.timeout_ms,
            }),
        }
    }

    /// Perform one logical call.
    ///
    /// # Errors
    ///
    /// - `Auth` if the agent's secret cannot be resolved or signing fails
    /// - `Payload` if the payload violates the agent's input schema
    /// - `RetryExhausted` carrying the last `Http`, `Timeout` or `Transport`
    ///   failure once every attempt has failed
    pub async fn invoke(
        &self,
        agent: &Agent,
        request: InvocationRequest,
    ) -> TesseraResult<Invocation> {
        let outbound = self.prepare(agent, &request).await?;
        let max_attempts = self.config.max_retries + 1;
        let mut last_error = TesseraError::Transport {
            reason: "no attempt was made".to_string(),
        };

        for attempt in 1..=max_attempts {
            debug!(
                agent_id = %agent.id,
                attempt,
                idempotency_key = %request.idempotency_key,
                "calling agent"
            );
            let started = Instant::now();

            match self.attempt(outbound.clone()).await {
                Ok(response) if response.is_success() => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let body = unwrap_response(&agent.convention, decode_body(&response.body));
                    let metrics = self.ledger.record(agent, latency_ms as f64, true);
                    debug!(agent_id = %agent.id, attempt, latency_ms, "agent call succeeded");
                    return Ok(Invocation {
                        response: body,
                        latency_ms,
                        attempts: attempt,
                        metrics,
                    });
                }
                Ok(response) => {
                    let status = response.status;
                    if status == 429 {
                        warn!(agent_id = %agent.id, attempt, "agent rate limited the call");
                    } else {
                        warn!(
                            agent_id = %agent.id,
                            attempt,
                            status,
                            "agent returned an error status"
                        );
                    }
                    last_error = TesseraError::Http {
                        status,
                        body: response.text(),
                    };
                }
                Err(err) if err.is_transient() => {
                    warn!(agent_id = %agent.id, attempt, error = %err, "agent call failed");
                    last_error = err;
                }
                Err(err) => return Err(err),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        self.ledger
            .record(agent, self.config.failure_latency_ms as f64, false);
        info!(
            agent_id = %agent.id,
            attempts = max_attempts,
            rate_limited = last_error.is_rate_limited(),
            "agent call exhausted retries"
        );
        Err(TesseraError::RetryExhausted {
            attempts: max_attempts,
            last: Box::new(last_error),
        })
    }

    /// `invoke` under an outer deadline.
    ///
    /// When the deadline elapses the in-flight attempt (or backoff sleep) is
    /// dropped, which cancels the underlying request, a failure is recorded
    /// with the deadline as its latency, and `Timeout` is returned.
    pub async fn invoke_with_deadline(
        &self,
        agent: &Agent,
        request: InvocationRequest,
        deadline: Duration,
    ) -> TesseraResult<Invocation> {
        match tokio::time::timeout(deadline, self.invoke(agent, request)).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = deadline.as_millis() as u64;
                self.ledger.record(agent, elapsed_ms as f64, false);
                warn!(agent_id = %agent.id, elapsed_ms, "caller deadline elapsed");
                Err(TesseraError::Timeout { elapsed_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use tessera_contracts::{
        agent::{Agent, AuthConfig},
        error::{TesseraError, TesseraResult},
        invoke::InvocationRequest,
    };
    use tessera_core::{
        traits::{AgentTransport, OutboundRequest, TransportResponse},
        StaticSecretResolver,
    };

    use super::AgentClient;
    use crate::config::ClientConfig;

    /// Replays a fixed list of responses, then repeats the last one.
    struct ScriptedTransport {
        script: Vec<TesseraResult<TransportResponse>>,
        calls: AtomicU32,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<TesseraResult<TransportResponse>>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl AgentTransport for ScriptedTransport {
        async fn post(&self, request: OutboundRequest) -> TesseraResult<TransportResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.seen.lock().unwrap().push(request);
            self.script[n.min(self.script.len() - 1)].clone()
        }
    }

    fn ok(body: serde_json::Value) -> TesseraResult<TransportResponse> {
        Ok(TransportResponse { status: 200, body: serde_json::to_vec(&body).unwrap() })
    }

    fn status(code: u16) -> TesseraResult<TransportResponse> {
        Ok(TransportResponse { status: code, body: b"nope".to_vec() })
    }

    fn client(transport: Arc<ScriptedTransport>) -> AgentClient {
        let config = ClientConfig { retry_delay_ms: 1, ..ClientConfig::default() };
        AgentClient::new(config, transport, Arc::new(StaticSecretResolver::new()))
    }

    fn agent() -> Agent {
        Agent::new("echo", "Echo", "owner-1", "http://agents.local/echo")
    }

    #[tokio::test]
    async fn success_returns_unwrapped_body_and_metrics() {
        let transport = ScriptedTransport::new(vec![ok(json!({ "data": { "result": "ok" } }))]);
        let client = client(transport.clone());

        let invocation = client
            .invoke(&agent(), InvocationRequest::new(json!({ "q": 1 }), "k-1"))
            .await
            .unwrap();

        assert_eq!(invocation.response, json!({ "result": "ok" }));
        assert_eq!(invocation.attempts, 1);
        assert_eq!(invocation.metrics.call_volume, 1);
        assert_eq!(invocation.metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn transient_failure_then_success_retries() {
        let transport = ScriptedTransport::new(vec![
            status(503),
            Err(TesseraError::Transport { reason: "reset".to_string() }),
            ok(json!({ "result": "ok" })),
        ]);
        let client = client(transport.clone());

        let invocation = client
            .invoke(&agent(), InvocationRequest::new(json!({}), "k-2"))
            .await
            .unwrap();

        assert_eq!(invocation.attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(invocation.metrics.call_volume, 1, "one metrics update per logical call");
    }

    #[tokio::test]
    async fn exhausted_retries_record_nominal_failure_latency() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        let client = client(transport.clone());
        let agent = agent();

        let err = client
            .invoke(&agent, InvocationRequest::new(json!({}), "k-3"))
            .await
            .unwrap_err();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        match err {
            TesseraError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, TesseraError::Http { status: 500, body: "nope".to_string() });
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }

        let metrics = client.metrics(&agent.id).unwrap();
        assert_eq!(metrics.call_volume, 1);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(metrics.avg_latency_ms, 30_000.0);
    }

    #[tokio::test]
    async fn missing_secret_fails_before_any_attempt() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let client = client(transport.clone());
        let mut agent = agent();
        agent.auth = AuthConfig::Hmac { secret_ref: "agent/echo/hmac".to_string() };

        let err = client
            .invoke(&agent, InvocationRequest::new(json!({}), "k-4"))
            .await
            .unwrap_err();

        assert!(matches!(err, TesseraError::Auth { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(client.metrics(&agent.id).is_none());
    }

    #[tokio::test]
    async fn input_schema_mismatch_is_payload_error() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let client = client(transport.clone());
        let mut agent = agent();
        agent.input_schema = json!({ "type": "object", "required": ["text"] });

        let err = client
            .invoke(&agent, InvocationRequest::new(json!({ "body": "x" }), "k-5"))
            .await
            .unwrap_err();

        assert!(matches!(err, TesseraError::Payload { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn headers_carry_identity_and_optional_trace() {
        let transport = ScriptedTransport::new(vec![ok(json!({}))]);
        let client = client(transport.clone());

        client
            .invoke(&agent(), InvocationRequest::new(json!({}), "k-6").with_trace_id("trace-9"))
            .await
            .unwrap();
        client
            .invoke(&agent(), InvocationRequest::new(json!({}), "k-7"))
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers["x-idempotency-key"], "k-6");
        assert_eq!(seen[0].headers["x-agent-id"], "echo");
        assert_eq!(seen[0].headers["x-trace-id"], "trace-9");
        assert_eq!(seen[0].headers["content-type"], "application/json");
        assert!(seen[0].headers["user-agent"].starts_with("tessera-agent-client/"));
        assert!(!seen[1].headers.contains_key("x-trace-id"));
    }

    #[tokio::test]
    async fn deadline_abandons_backoff_and_returns_timeout() {
        let transport = ScriptedTransport::new(vec![status(502)]);
        let config = ClientConfig { retry_delay_ms: 60_000, ..ClientConfig::default() };
        let secrets = Arc::new(StaticSecretResolver::new());
        let client = AgentClient::new(config, transport.clone(), secrets);
        let agent = agent();

        let err = client
            .invoke_with_deadline(
                &agent,
                InvocationRequest::new(json!({}), "k-8"),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();

        assert_eq!(err, TesseraError::Timeout { elapsed_ms: 50 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.metrics(&agent.id).unwrap().success_count, 0);
    }
}
