//! # tessera-invoke
//!
//! The agent invocation client.
//!
//! [`client::AgentClient`] performs one logical call to a registered agent:
//!
//! 1. **Auth**: [`auth::AuthResolver`] signs the body (HMAC) or mints a
//!    bearer token, depending on the agent's `AuthConfig`.
//! 2. **Payload**: [`payload`] wraps legacy-webhook bodies in their envelope
//!    and serializes every body canonically.
//! 3. **Attempts**: bounded retries with linear backoff over an
//!    `AgentTransport` ([`transport::HttpTransport`] by default).
//! 4. **Metrics**: [`metrics::MetricsLedger`] folds the outcome into the
//!    agent's rolling metrics under a per-agent lock.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_invoke::{AgentClient, ClientConfig};
//!
//! let client = AgentClient::http(ClientConfig::default(), Arc::new(secrets))?;
//! let invocation = client
//!     .invoke(&agent, InvocationRequest::new(json!({ "text": "hi" }), "req-1"))
//!     .await?;
//! agent.metrics = invocation.metrics;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod metrics;
pub mod payload;
pub mod transport;

pub use client::AgentClient;
pub use config::ClientConfig;
pub use transport::HttpTransport;
