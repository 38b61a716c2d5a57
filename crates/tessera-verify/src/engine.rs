//! Probe-based agent verification.
//!
//! `VerificationEngine` runs a fixed protocol against an agent:
//!
//! 1. **Probe**: the agent's declared sample request is sent three times,
//!    sequentially, through the invocation client. Each probe records its
//!    status, latency and any failure.
//! 2. **Validate**: each successful response is checked against the agent's
//!    declared output schema.
//! 3. **Score**: the report derives score and level from the probe list.
//! 4. **Recommend**: baseline recommendations, optionally expanded by a text
//!    oracle for low levels.
//! 5. **Apply**: the agent's level, status and report are overwritten.
//!
//! Verification never fails: every probe failure is data in the report, and
//! an agent whose probes all fail is simply `unverified`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tessera_contracts::{
    agent::{Agent, AgentId, AgentStatus, VerificationLevel},
    error::TesseraResult,
    invoke::InvocationRequest,
    verify::{
        level_for_score, score_tally, ProbeResult, ProbeStatus, ProbeTally, VerificationReport,
        PROBE_COUNT,
    },
};
use tessera_core::{
    schema::schema_violations,
    traits::{AgentStore, TextOracle},
};
use tessera_invoke::AgentClient;

use crate::recommend::{
    baseline_recommendations, parse_suggestions, suggestion_prompt, wants_suggestions,
};

pub struct VerificationEngine {
    client: Arc<AgentClient>,
    oracle: Option<Arc<dyn TextOracle>>,
}

impl VerificationEngine {
    pub fn new(client: Arc<AgentClient>) -> Self {
        Self { client, oracle: None }
    }

    /// Attach a text oracle used to expand recommendations for low levels.
    pub fn with_oracle(mut self, oracle: Arc<dyn TextOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// The request body every probe sends. Agents without a declared sample
    /// are probed with an empty object.
    fn probe_payload(agent: &Agent) -> Value {
        match &agent.examples.sample_request {
            Value::Null => Value::Object(Map::new()),
            sample => sample.clone(),
        }
    }

    async fn probe(&self, agent: &Agent, run: &Uuid, index: u32, payload: &Value) -> ProbeResult {
        let request = InvocationRequest::new(
            payload.clone(),
            format!("verify-{}-{run}-{index}", agent.id),
        )
        .with_trace_id(format!("verify-{run}"));

        let started = Instant::now();
        let outcome = match agent.verification_policy.timeout_ms {
            Some(ms) => {
                self.client
                    .invoke_with_deadline(agent, request, Duration::from_millis(ms))
                    .await
            }
            None => self.client.invoke(agent, request).await,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(invocation) => {
                let errors = schema_violations(&agent.output_schema, &invocation.response);
                debug!(
                    agent_id = %agent.id,
                    probe = index,
                    latency_ms,
                    schema_valid = errors.is_empty(),
                    "probe completed"
                );
                ProbeResult {
                    index,
                    status: ProbeStatus::Success,
                    latency_ms,
                    schema_valid: errors.is_empty(),
                    errors,
                }
            }
            Err(err) => {
                warn!(agent_id = %agent.id, probe = index, error = %err, "probe failed");
                ProbeResult {
                    index,
                    status: ProbeStatus::Failure,
                    latency_ms,
                    schema_valid: false,
                    errors: vec![err.to_string()],
                }
            }
        }
    }

    async fn suggested_fixes(
        &self,
        agent: &Agent,
        level: VerificationLevel,
        probes: &[ProbeResult],
        recommendations: &[String],
    ) -> Vec<String> {
        let Some(oracle) = &self.oracle else {
            return Vec::new();
        };
        if !wants_suggestions(level) {
            return Vec::new();
        }

        let prompt = suggestion_prompt(agent, level, probes, recommendations);
        match oracle.complete(&prompt).await {
            Ok(text) => parse_suggestions(&text),
            Err(err) => {
                warn!(agent_id = %agent.id, error = %err, "recommendation expansion failed");
                Vec::new()
            }
        }
    }

    /// Verify `agent` and record the outcome on it.
    ///
    /// Sets `verification_level`, `status` (`active` above `unverified`,
    /// otherwise `pending`), `verification_report`, and the metrics the
    /// probes produced.
    pub async fn verify(&self, agent: &mut Agent) -> VerificationReport {
        let run = Uuid::new_v4();
        let payload = Self::probe_payload(agent);

        let mut probes = Vec::with_capacity(PROBE_COUNT as usize);
        for index in 1..=PROBE_COUNT {
            probes.push(self.probe(agent, &run, index, &payload).await);
        }

        let tally = ProbeTally::from_probes(&probes);
        let level = level_for_score(score_tally(&tally));
        let mut recommendations = baseline_recommendations(&tally);
        let fixes = self
            .suggested_fixes(agent, level, &probes, &recommendations)
            .await;
        recommendations.extend(fixes);

        let report = VerificationReport::from_probes(probes, recommendations);
        Self::apply(agent, &report);
        if let Some(metrics) = self.client.metrics(&agent.id) {
            agent.metrics = metrics;
        }

        info!(
            agent_id = %agent.id,
            level = %report.level(),
            score = report.score(),
            successful_calls = tally.successful_calls,
            schema_matches = tally.schema_matches,
            "agent verification complete"
        );
        report
    }

    fn apply(agent: &mut Agent, report: &VerificationReport) {
        agent.verification_level = report.level();
        agent.status = if report.level() == VerificationLevel::Unverified {
            AgentStatus::Pending
        } else {
            AgentStatus::Active
        };
        agent.verification_report = Some(report.clone());
    }

    /// Load an agent from `store`, verify it and persist the result.
    ///
    /// Only store failures are errors; probe failures are in the report.
    pub async fn verify_registered(
        &self,
        store: &dyn AgentStore,
        agent_id: &AgentId,
    ) -> TesseraResult<VerificationReport> {
        let mut agent = store.get_agent(agent_id).await?;
        let report = self.verify(&mut agent).await;
        store.put_agent(&agent).await?;
        Ok(report)
    }
}
