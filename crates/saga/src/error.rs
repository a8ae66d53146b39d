use propledger_core::SagaId;
use propledger_events::EventError;

/// Saga orchestration error.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    /// Operation attempted on a terminal or out-of-order instance.
    #[error("invalid saga state: {reason}")]
    InvalidSagaState { reason: String },

    #[error("saga not found: {id}")]
    SagaNotFound { id: SagaId },

    #[error("unknown saga definition: {name}")]
    UnknownSaga { name: String },

    #[error("saga {saga} has no step named {step}")]
    UnknownStep { saga: String, step: String },

    #[error("saga belongs to another organization")]
    OrgIsolation,

    /// Payload rejected by the saga's typed schema.
    #[error("saga payload rejected: {0}")]
    Payload(String),

    #[error("saga storage failed: {0}")]
    Store(String),

    #[error(transparent)]
    Event(#[from] EventError),
}
