//! Step-dispatch worker loop.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use propledger_events::{DomainEvent, EventBus, Subscription};

use crate::error::SagaError;
use crate::orchestrator::{Orchestrator, SAGA_STEP_READY, StepReady};
use crate::state::{SagaState, SagaStatus};

/// Executes one saga step in response to a continuation event.
///
/// Implementations perform the step's side effects, which must be
/// idempotent (at-least-once delivery), and then drive the orchestrator
/// forward themselves: `advance` to the next step, or `complete` on the
/// last one. Returning an error moves the instance to `failed`; the worker
/// never retries on its own.
pub trait SagaHandler: Send {
    fn execute_step(&mut self, saga: &SagaState, step: &str) -> anyhow::Result<()>;
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Consumes `saga.step_ready` continuations and dispatches them to the
/// handler registered for the saga's name.
///
/// One worker serves one organization; events from other organizations are
/// ignored, as are continuations for sagas with no registered handler.
pub struct SagaWorker {
    orchestrator: Orchestrator,
    handlers: HashMap<String, Box<dyn SagaHandler>>,
}

impl SagaWorker {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            handlers: HashMap::new(),
        }
    }

    /// Route continuations for `saga_name` to `handler`.
    pub fn register(
        mut self,
        saga_name: impl Into<String>,
        handler: impl SagaHandler + 'static,
    ) -> Self {
        self.handlers.insert(saga_name.into(), Box::new(handler));
        self
    }

    /// Handle one event. Returns whether a step was dispatched.
    ///
    /// Continuations that are stale by the time they arrive (the instance
    /// already moved past the named step, or is no longer running) are
    /// skipped, which makes redelivery harmless. A handler error fails the
    /// saga and still counts as dispatched.
    pub fn process(&mut self, event: &DomainEvent) -> Result<bool, SagaError> {
        if event.org_id != self.orchestrator.org_id() || event.event_type != SAGA_STEP_READY {
            return Ok(false);
        }

        let ready: StepReady = event
            .payload_as()
            .map_err(|e| SagaError::Payload(format!("step_ready payload: {e}")))?;

        let Some(handler) = self.handlers.get_mut(&ready.name) else {
            debug!(saga = %ready.saga_id, name = %ready.name, "no handler registered, skipping");
            return Ok(false);
        };

        let state = self.orchestrator.saga(ready.saga_id)?;
        if state.status != SagaStatus::Running || state.current_step != ready.step {
            debug!(
                saga = %state.id,
                status = %state.status,
                step = %state.current_step,
                ready = %ready.step,
                "stale continuation, skipping"
            );
            return Ok(false);
        }

        if let Err(err) = handler.execute_step(&state, &ready.step) {
            warn!(saga = %state.id, step = %ready.step, error = %err, "saga step failed");
            if let Err(transition_err) = self.orchestrator.fail(state.id, &format!("{err:#}")) {
                // The handler may have moved the instance itself before
                // erroring out.
                debug!(saga = %state.id, error = %transition_err, "failure transition skipped");
            }
        }

        Ok(true)
    }

    /// Spawn a thread feeding bus events through [`SagaWorker::process`].
    pub fn spawn(mut self, name: &'static str, bus: &Arc<dyn EventBus>) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run(sub, shutdown_rx))
            .expect("failed to spawn saga worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    fn run(&mut self, sub: Subscription, shutdown_rx: mpsc::Receiver<()>) {
        let tick = Duration::from_millis(250);

        loop {
            // Shutdown check (non-blocking)
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match sub.recv_timeout(tick) {
                Ok(event) => {
                    if let Err(err) = self.process(&event) {
                        warn!(error = %err, "saga worker could not process event");
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
