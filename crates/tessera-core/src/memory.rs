//! In-memory collaborator implementations.
//!
//! `InMemoryAgentStore` and `StaticSecretResolver` are reference
//! implementations of `AgentStore` and `SecretResolver`. They keep their data
//! behind a `Mutex`, so clones of the store share state across tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use tessera_contracts::{
    agent::{Agent, AgentId},
    error::{TesseraError, TesseraResult},
    provenance::NodeOutput,
};

use crate::traits::{AgentStore, SecretResolver};

// ── Agent store ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct StoreState {
    agents: HashMap<AgentId, Agent>,
    runs: HashMap<String, Vec<NodeOutput>>,
}

/// An `AgentStore` that lives for the lifetime of the process.
#[derive(Clone, Default)]
pub struct InMemoryAgentStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> TesseraResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| TesseraError::Store {
            reason: format!("store lock poisoned: {e}"),
        })
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get_agent(&self, id: &AgentId) -> TesseraResult<Agent> {
        self.lock()?
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| TesseraError::NotFound {
                entity: "agent".to_string(),
                id: id.to_string(),
            })
    }

    async fn put_agent(&self, agent: &Agent) -> TesseraResult<()> {
        debug!(agent_id = %agent.id, "storing agent");
        self.lock()?.agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn append_node_outputs(
        &self,
        run_id: &str,
        outputs: Vec<NodeOutput>,
    ) -> TesseraResult<()> {
        debug!(run_id, count = outputs.len(), "appending node outputs");
        self.lock()?
            .runs
            .entry(run_id.to_string())
            .or_default()
            .extend(outputs);
        Ok(())
    }

    async fn node_outputs(&self, run_id: &str) -> TesseraResult<Vec<NodeOutput>> {
        Ok(self.lock()?.runs.get(run_id).cloned().unwrap_or_default())
    }
}

// ── Secret resolver ──────────────────────────────────────────────────────────

/// A `SecretResolver` over a fixed name → value table.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<String, String>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Load each named secret from the environment variable of the same name,
    /// skipping unset variables.
    pub fn from_env<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let secrets = names
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();
        Self { secrets }
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn get_secret(&self, name: &str) -> TesseraResult<String> {
        match self.secrets.get(name) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ => Err(TesseraError::Auth {
                reason: format!("secret '{name}' could not be resolved"),
            }),
        }
    }
}
