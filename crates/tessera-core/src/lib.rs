//! # tessera-core
//!
//! The collaborator boundary of the tessera runtime.
//!
//! This crate provides:
//! - The collaborator traits (`AgentTransport`, `SecretResolver`,
//!   `AgentStore`, `TextOracle`)
//! - Structural JSON Schema validation shared by the invocation client and
//!   the verification engine
//! - In-memory reference collaborators for tests and local runs

pub mod memory;
pub mod schema;
pub mod traits;

pub use memory::{InMemoryAgentStore, StaticSecretResolver};
