//! Error types shared by every tessera crate.
//!
//! All fallible operations return `TesseraResult<T>`. Variants are grouped by
//! how the invocation client treats them: `Auth` and `Payload` are fatal for a
//! call, `Timeout`, `Http` and `Transport` are transient and retried, and
//! `RetryExhausted` is terminal and keeps the last underlying failure.

use thiserror::Error;

/// The unified error type for the tessera runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TesseraError {
    /// A secret could not be resolved or a request could not be signed.
    #[error("auth error: {reason}")]
    Auth { reason: String },

    /// The request body does not have the shape the agent declared.
    #[error("payload error: {reason}")]
    Payload { reason: String },

    /// A single attempt, or the caller's outer deadline, elapsed.
    #[error("agent call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The agent answered with a non-2xx status.
    #[error("agent returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced an HTTP response (connect, TLS, reset, ...).
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// Every allowed attempt failed. `last` is the final observed failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<TesseraError>,
    },

    /// A configuration document is missing or malformed.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The entity store rejected a read or write.
    #[error("store error: {reason}")]
    Store { reason: String },

    /// The text-generation collaborator failed.
    #[error("oracle error: {reason}")]
    Oracle { reason: String },

    /// A referenced entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },
}

impl TesseraError {
    /// True for failures the invocation client retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TesseraError::Timeout { .. }
                | TesseraError::Http { .. }
                | TesseraError::Transport { .. }
        )
    }

    /// True when the failure (or the last failure behind a `RetryExhausted`)
    /// is an HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            TesseraError::Http { status, .. } => *status == 429,
            TesseraError::RetryExhausted { last, .. } => last.is_rate_limited(),
            _ => false,
        }
    }
}

/// Convenience alias used throughout the tessera crates.
pub type TesseraResult<T> = Result<T, TesseraError>;
