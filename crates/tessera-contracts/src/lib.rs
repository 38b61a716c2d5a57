//! # tessera-contracts
//!
//! Shared types, schemas, and error contracts for the tessera runtime.
//!
//! All crates in the workspace import from here. Besides data definitions
//! this crate holds only the derivations that are part of a type's
//! invariants: metrics folding and verification scoring.

pub mod agent;
pub mod error;
pub mod invoke;
pub mod manifest;
pub mod provenance;
pub mod verify;
