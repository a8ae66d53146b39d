use thiserror::Error;

/// Event log / bus operation error.
///
/// These are infrastructure errors (storage, isolation, publication) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventError {
    #[error("organization isolation violation: {0}")]
    OrgIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}
