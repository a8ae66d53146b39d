//! Log-then-publish composition.

use std::sync::Arc;

use tracing::warn;

use crate::bus::EventBus;
use crate::error::EventError;
use crate::event::{DomainEvent, NewEvent};
use crate::log::EventLog;

/// Destination for events produced by domain services.
///
/// Object-safe so services can hold `Arc<dyn EventSink>` without caring
/// whether events go to an in-memory log or a real broker behind it.
pub trait EventSink: Send + Sync {
    /// Record a batch of events (all-or-nothing append).
    fn record_batch(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError>;

    /// Record a single event.
    fn record(&self, event: NewEvent) -> Result<DomainEvent, EventError> {
        let mut stored = self.record_batch(vec![event])?;
        stored
            .pop()
            .ok_or_else(|| EventError::InvalidAppend("append returned empty batch".to_string()))
    }
}

impl<S> EventSink for Arc<S>
where
    S: EventSink + ?Sized,
{
    fn record_batch(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError> {
        (**self).record_batch(events)
    }
}

/// Appends events to the log, then publishes them to the bus.
///
/// The append is authoritative: a publication failure is logged and
/// swallowed, never propagated, because the event is already durable and
/// consumers recover from the log. Ordering is append order.
pub struct EventRecorder {
    log: Arc<dyn EventLog>,
    bus: Arc<dyn EventBus>,
}

impl EventRecorder {
    pub fn new(log: Arc<dyn EventLog>, bus: Arc<dyn EventBus>) -> Self {
        Self { log, bus }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }
}

impl EventSink for EventRecorder {
    fn record_batch(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError> {
        let stored = self.log.append(events)?;

        for event in &stored {
            if let Err(e) = self.bus.publish(event.clone()) {
                warn!(
                    event_type = %event.event_type,
                    event_id = %event.event_id,
                    error = %e,
                    "event publication failed after append"
                );
            }
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use propledger_core::{OrgId, TraceId};
    use serde_json::json;
    use uuid::Uuid;

    use crate::in_memory_bus::InMemoryEventBus;
    use crate::in_memory_log::InMemoryEventLog;

    #[test]
    fn appends_then_publishes_with_assigned_sequence() {
        let log = Arc::new(InMemoryEventLog::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let recorder = EventRecorder::new(log.clone(), bus.clone());

        let subscription = bus.subscribe();
        let org_id = OrgId::new();

        let stored = recorder
            .record(NewEvent::new(
                org_id,
                TraceId::new(),
                "test.aggregate",
                Uuid::now_v7(),
                "test.happened",
                Utc::now(),
                json!({"n": 1}),
            ))
            .unwrap();

        assert_eq!(stored.sequence, 1);

        let published = subscription.try_recv().unwrap();
        assert_eq!(published.event_id, stored.event_id);
        assert_eq!(published.sequence, 1);

        // The append is durable independent of delivery.
        assert_eq!(log.events_for_org(org_id).unwrap().len(), 1);
    }
}
