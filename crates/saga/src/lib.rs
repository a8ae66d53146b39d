//! Durable saga orchestration.
//!
//! A saga is a multi-step business transaction persisted between steps.
//! The orchestrator owns every state transition and emits a continuation
//! event after each one; a worker loop consumes those events and executes
//! the named step, so suspension and resumption points are explicit
//! messages rather than callback chains. Step side effects must be
//! idempotent (ledger idempotency keys); the orchestrator's advance is the
//! single record of "this step is done".

pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod store;
pub mod worker;

pub use error::SagaError;
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, SAGA_AGGREGATE, SAGA_COMPENSATED, SAGA_COMPENSATING,
    SAGA_COMPLETED, SAGA_FAILED, SAGA_STARTED, SAGA_STEP_READY, SagaCompensated, SagaCompensating,
    SagaCompleted, SagaFailed, SagaStarted, StalledSaga, StepReady,
};
pub use registry::{SagaDefinition, SagaRegistry};
pub use state::{SagaState, SagaStatus};
pub use store::{InMemorySagaStore, SagaStore};
pub use worker::{SagaHandler, SagaWorker, WorkerHandle};
