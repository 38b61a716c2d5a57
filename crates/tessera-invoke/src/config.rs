//! Invocation client configuration.
//!
//! `ClientConfig` is read from TOML. Every key is optional; omitted keys keep
//! the defaults below, which are the values the retry and timeout policy is
//! designed around.
//!
//! ```toml
//! client_identity = "tessera-agent-client/0.1.0"
//! timeout_ms = 30000
//! max_retries = 2
//! retry_delay_ms = 1000
//! service_secret_ref = "AGENT_JWT_SECRET"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tessera_contracts::error::{TesseraError, TesseraResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `User-Agent` on every call.
    pub client_identity: String,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Base backoff; attempt `n` waits `retry_delay_ms * n` before retrying.
    pub retry_delay_ms: u64,
    /// Latency recorded in metrics when every attempt failed.
    pub failure_latency_ms: u64,
    /// Secret used to sign bearer tokens for `AuthConfig::Bearer` agents.
    pub service_secret_ref: String,
    pub token_ttl_secs: i64,
    pub token_issuer: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_identity: format!("tessera-agent-client/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30_000,
            max_retries: 2,
            retry_delay_ms: 1_000,
            failure_latency_ms: 30_000,
            service_secret_ref: "AGENT_JWT_SECRET".to_string(),
            token_ttl_secs: 3_600,
            token_issuer: "tessera".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TesseraError::Config` if the TOML is malformed or a key has
    /// the wrong type.
    pub fn from_toml_str(s: &str) -> TesseraResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TesseraError::Config {
            reason: format!("failed to parse client config TOML: {e}"),
        })?;
        config.token_ttl()?;
        Ok(config)
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TesseraError::Config {
            reason: format!("failed to read client config '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Lifetime of minted bearer tokens. Must be positive and representable.
    pub fn token_ttl(&self) -> TesseraResult<chrono::Duration> {
        chrono::Duration::try_seconds(self.token_ttl_secs)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| TesseraError::Config {
                reason: format!("token_ttl_secs {} is out of range", self.token_ttl_secs),
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Backoff before retrying after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}
