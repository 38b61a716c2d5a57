//! # tessera-verify
//!
//! Probe-based verification for agents registered with the tessera runtime.
//!
//! [`engine::VerificationEngine`] sends an agent's declared sample request
//! three times through the invocation client, checks each response against
//! the declared output schema, and derives a score and trust level:
//!
//! | score       | level        |
//! |-------------|--------------|
//! | `>= 0.92`   | `L3`         |
//! | `>= 0.75`   | `L2`         |
//! | `>= 0.50`   | `L1`         |
//! | otherwise   | `unverified` |
//!
//! [`recommend`] turns the probe tally into recommendations and, when a
//! `TextOracle` is attached, asks it for concrete fixes on low levels.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tessera_verify::engine::VerificationEngine;
//!
//! let engine = VerificationEngine::new(Arc::new(client));
//! let report = engine.verify(&mut agent).await;
//! assert_eq!(agent.verification_level, report.level());
//! ```

pub mod engine;
pub mod recommend;

pub use engine::VerificationEngine;
