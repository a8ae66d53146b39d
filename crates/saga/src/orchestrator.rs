//! Saga state machine transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use propledger_core::{OrgId, SagaId, TraceId};
use propledger_events::{EventSink, NewEvent};

use crate::error::SagaError;
use crate::registry::SagaRegistry;
use crate::state::{SagaState, SagaStatus};
use crate::store::SagaStore;

pub const SAGA_AGGREGATE: &str = "saga";

pub const SAGA_STARTED: &str = "saga.started";
pub const SAGA_STEP_READY: &str = "saga.step_ready";
pub const SAGA_COMPLETED: &str = "saga.completed";
pub const SAGA_FAILED: &str = "saga.failed";
pub const SAGA_COMPENSATING: &str = "saga.compensating";
pub const SAGA_COMPENSATED: &str = "saga.compensated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStarted {
    pub saga_id: SagaId,
    pub name: String,
    pub step: String,
}

/// Continuation message: the named step is ready to execute.
///
/// Consumed by the worker loop; every step of a saga runs because exactly
/// this event told it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReady {
    pub saga_id: SagaId,
    pub name: String,
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaCompleted {
    pub saga_id: SagaId,
    pub name: String,
    pub result: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaFailed {
    pub saga_id: SagaId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaCompensating {
    pub saga_id: SagaId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaCompensated {
    pub saga_id: SagaId,
    pub name: String,
}

/// Liveness tuning for [`Orchestrator::stalled_sagas`].
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Heartbeat age past which a running instance counts as a zombie.
    pub zombie_threshold: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            zombie_threshold: Duration::from_secs(10 * 60),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_zombie_threshold(mut self, threshold: Duration) -> Self {
        self.zombie_threshold = threshold;
        self
    }
}

/// A running instance flagged for operator attention.
///
/// `zombie` is driven by heartbeat age alone; `timed_out` by total runtime
/// against the instance's own timeout. Flagging never mutates the saga.
#[derive(Debug, Clone)]
pub struct StalledSaga {
    pub state: SagaState,
    pub zombie: bool,
    pub timed_out: bool,
}

/// Saga orchestrator scoped to one organization.
///
/// Owns every state transition. Each transition persists first and then
/// emits one domain event tagged with the instance's trace and saga ids;
/// step execution resumes from those events, never from an in-process
/// callback. Terminal instances reject all further operations with
/// [`SagaError::InvalidSagaState`].
#[derive(Clone)]
pub struct Orchestrator {
    org_id: OrgId,
    store: Arc<dyn SagaStore>,
    registry: Arc<SagaRegistry>,
    events: Arc<dyn EventSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        org_id: OrgId,
        store: Arc<dyn SagaStore>,
        registry: Arc<SagaRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            org_id,
            store,
            registry,
            events,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Fetch an instance for inspection.
    pub fn saga(&self, id: SagaId) -> Result<SagaState, SagaError> {
        self.load(id)
    }

    /// Create a new instance at the definition's first step.
    ///
    /// Persists the instance as `running`, then emits `saga.started`
    /// followed by the first `saga.step_ready` continuation. Execution of
    /// the step belongs to whichever worker consumes that continuation.
    pub fn start(
        &self,
        name: &str,
        initial_step: &str,
        payload: JsonValue,
        trace_id: TraceId,
        timeout: Duration,
    ) -> Result<SagaState, SagaError> {
        let definition = self.registry.get(name)?;
        if !definition.contains_step(initial_step) {
            return Err(SagaError::UnknownStep {
                saga: name.to_string(),
                step: initial_step.to_string(),
            });
        }
        if definition.first_step() != Some(initial_step) {
            return Err(SagaError::InvalidSagaState {
                reason: format!("saga {name} does not start at step {initial_step}"),
            });
        }

        let now = Utc::now();
        let state = SagaState {
            id: SagaId::new(),
            org_id: self.org_id,
            name: name.to_string(),
            current_step: initial_step.to_string(),
            payload,
            status: SagaStatus::Running,
            trace_id,
            timeout,
            last_heartbeat_at: now,
            started_at: now,
            updated_at: now,
            result: None,
            error: None,
        };

        self.store.insert(state.clone())?;

        self.events.record_batch(vec![
            self.event(
                &state,
                SAGA_STARTED,
                &SagaStarted {
                    saga_id: state.id,
                    name: state.name.clone(),
                    step: state.current_step.clone(),
                },
            )?,
            self.event(
                &state,
                SAGA_STEP_READY,
                &StepReady {
                    saga_id: state.id,
                    name: state.name.clone(),
                    step: state.current_step.clone(),
                },
            )?,
        ])?;

        info!(saga = %state.id, name, step = initial_step, "saga started");
        Ok(state)
    }

    /// Move a running instance to the immediate successor of its current
    /// step, merging `patch` into the stored payload.
    ///
    /// Must be called only after the current step's side effects have
    /// durably committed; this transition is the single record that the
    /// step is done. Emits the successor's `saga.step_ready` continuation.
    pub fn advance(
        &self,
        id: SagaId,
        next_step: &str,
        patch: JsonValue,
    ) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        ensure_running(&state)?;

        let definition = self.registry.get(&state.name)?;
        if !definition.contains_step(next_step) {
            return Err(SagaError::UnknownStep {
                saga: state.name.clone(),
                step: next_step.to_string(),
            });
        }
        match definition.successor(&state.current_step) {
            Some(expected) if expected == next_step => {}
            Some(expected) => {
                return Err(SagaError::InvalidSagaState {
                    reason: format!(
                        "saga {id} at step {} may only advance to {expected}, not {next_step}",
                        state.current_step
                    ),
                });
            }
            None => {
                return Err(SagaError::InvalidSagaState {
                    reason: format!(
                        "saga {id} is at its final step {}",
                        state.current_step
                    ),
                });
            }
        }

        let now = Utc::now();
        state.merge_payload(patch);
        state.current_step = next_step.to_string();
        state.last_heartbeat_at = now;
        state.updated_at = now;

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_STEP_READY,
            &StepReady {
                saga_id: state.id,
                name: state.name.clone(),
                step: state.current_step.clone(),
            },
        )?;

        info!(saga = %id, step = next_step, "saga advanced");
        Ok(state)
    }

    /// Refresh liveness for a non-terminal instance.
    pub fn heartbeat(&self, id: SagaId) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        if state.is_terminal() {
            return Err(SagaError::InvalidSagaState {
                reason: format!("saga {id} is {}, which accepts no heartbeat", state.status),
            });
        }

        let now = Utc::now();
        state.last_heartbeat_at = now;
        state.updated_at = now;
        self.store.update(&state)?;

        debug!(saga = %id, "saga heartbeat");
        Ok(state)
    }

    /// Terminal happy-path transition.
    pub fn complete(&self, id: SagaId, result: JsonValue) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        ensure_running(&state)?;

        state.status = SagaStatus::Completed;
        state.result = Some(result.clone());
        state.updated_at = Utc::now();

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_COMPLETED,
            &SagaCompleted {
                saga_id: state.id,
                name: state.name.clone(),
                result,
            },
        )?;

        info!(saga = %id, name = %state.name, "saga completed");
        Ok(state)
    }

    /// Terminal failure transition. Valid from `running` and from
    /// `compensating` (a compensation that itself failed).
    pub fn fail(&self, id: SagaId, reason: &str) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        if state.is_terminal() {
            return Err(SagaError::InvalidSagaState {
                reason: format!("saga {id} is already {}", state.status),
            });
        }

        state.status = SagaStatus::Failed;
        state.error = Some(reason.to_string());
        state.updated_at = Utc::now();

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_FAILED,
            &SagaFailed {
                saga_id: state.id,
                name: state.name.clone(),
                reason: reason.to_string(),
            },
        )?;

        warn!(saga = %id, name = %state.name, reason, "saga failed");
        Ok(state)
    }

    /// Begin explicit rollback of a running instance.
    pub fn begin_compensation(&self, id: SagaId, reason: &str) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        ensure_running(&state)?;

        state.status = SagaStatus::Compensating;
        state.error = Some(reason.to_string());
        state.updated_at = Utc::now();

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_COMPENSATING,
            &SagaCompensating {
                saga_id: state.id,
                name: state.name.clone(),
                reason: reason.to_string(),
            },
        )?;

        warn!(saga = %id, name = %state.name, reason, "saga compensating");
        Ok(state)
    }

    /// Record that compensation finished. Valid only from `compensating`.
    pub fn mark_compensated(&self, id: SagaId) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        if state.status != SagaStatus::Compensating {
            return Err(SagaError::InvalidSagaState {
                reason: format!("saga {id} is {}, not compensating", state.status),
            });
        }

        state.status = SagaStatus::Compensated;
        state.updated_at = Utc::now();

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_COMPENSATED,
            &SagaCompensated {
                saga_id: state.id,
                name: state.name.clone(),
            },
        )?;

        info!(saga = %id, name = %state.name, "saga compensated");
        Ok(state)
    }

    /// Scan running instances for liveness problems as of `now`.
    ///
    /// An instance is a zombie when its heartbeat age exceeds the
    /// configured threshold, and timed out when its total runtime exceeds
    /// its own caller-supplied timeout. The two flags are independent: a
    /// saga heartbeating every few minutes is never a zombie, however long
    /// it has been running. Flagged instances are left untouched; recovery
    /// is an explicit [`Orchestrator::resurrect`] or
    /// [`Orchestrator::force_fail`].
    pub fn stalled_sagas(&self, now: DateTime<Utc>) -> Result<Vec<StalledSaga>, SagaError> {
        let mut stalled = Vec::new();

        for state in self.store.list_running(self.org_id)? {
            let zombie = state.heartbeat_age(now) > self.config.zombie_threshold;
            let timed_out = state.runtime(now) > state.timeout;
            if zombie || timed_out {
                warn!(
                    saga = %state.id,
                    name = %state.name,
                    step = %state.current_step,
                    zombie,
                    timed_out,
                    "saga stalled"
                );
                stalled.push(StalledSaga {
                    state,
                    zombie,
                    timed_out,
                });
            }
        }

        Ok(stalled)
    }

    /// Operator recovery: re-emit the current step's continuation for a
    /// running instance whose worker died mid-step.
    pub fn resurrect(&self, id: SagaId) -> Result<SagaState, SagaError> {
        let mut state = self.load(id)?;
        ensure_running(&state)?;

        let now = Utc::now();
        state.last_heartbeat_at = now;
        state.updated_at = now;

        self.store.update(&state)?;
        self.emit(
            &state,
            SAGA_STEP_READY,
            &StepReady {
                saga_id: state.id,
                name: state.name.clone(),
                step: state.current_step.clone(),
            },
        )?;

        info!(saga = %id, step = %state.current_step, "saga resurrected");
        Ok(state)
    }

    /// Operator recovery: give up on a stalled instance.
    pub fn force_fail(&self, id: SagaId, reason: &str) -> Result<SagaState, SagaError> {
        warn!(saga = %id, "saga failure forced by operator");
        self.fail(id, reason)
    }

    fn load(&self, id: SagaId) -> Result<SagaState, SagaError> {
        self.store
            .get(self.org_id, id)?
            .ok_or(SagaError::SagaNotFound { id })
    }

    fn event<P: Serialize>(
        &self,
        state: &SagaState,
        event_type: &str,
        payload: &P,
    ) -> Result<NewEvent, SagaError> {
        Ok(NewEvent::from_typed(
            self.org_id,
            state.trace_id,
            SAGA_AGGREGATE,
            *state.id.as_uuid(),
            event_type,
            state.updated_at,
            payload,
        )?
        .for_saga(state.id))
    }

    fn emit<P: Serialize>(
        &self,
        state: &SagaState,
        event_type: &str,
        payload: &P,
    ) -> Result<(), SagaError> {
        self.events.record(self.event(state, event_type, payload)?)?;
        Ok(())
    }
}

fn ensure_running(state: &SagaState) -> Result<(), SagaError> {
    if state.status != SagaStatus::Running {
        return Err(SagaError::InvalidSagaState {
            reason: format!("saga {} is {}, not running", state.id, state.status),
        });
    }
    Ok(())
}
