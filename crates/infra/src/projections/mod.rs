//! Read-model projections fed by the event bus.
//!
//! Projections are idempotent consumers: they track a per-stream cursor and
//! skip already-applied sequence numbers (at-least-once delivery).

pub mod accounts;
pub mod shipments;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event does not match envelope stream: {0}")]
    IdentityMismatch(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}
