//! Per-agent metrics ledger.
//!
//! The ledger owns the authoritative `AgentMetrics` for every agent the client
//! has called. Each agent's entry is seeded from the first snapshot the client
//! sees and is updated under that agent's own lock, so concurrent calls to the
//! same agent never lose an increment while calls to different agents do not
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use tessera_contracts::agent::{Agent, AgentId, AgentMetrics};

type Slot = Arc<Mutex<AgentMetrics>>;

#[derive(Default)]
pub struct MetricsLedger {
    slots: Mutex<HashMap<AgentId, Slot>>,
}

impl MetricsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, agent: &Agent) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(agent.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(agent.metrics.clone())))
            .clone()
    }

    /// Fold one call outcome into `agent`'s metrics and return the new
    /// snapshot.
    pub fn record(&self, agent: &Agent, latency_ms: f64, success: bool) -> AgentMetrics {
        let slot = self.slot(agent);
        let mut current = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = current.record(latency_ms, success, Utc::now());
        current.clone()
    }

    /// Current snapshot, if the agent has been called through this ledger.
    pub fn snapshot(&self, id: &AgentId) -> Option<AgentMetrics> {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.get(id).map(|slot| {
            slot.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        })
    }
}
