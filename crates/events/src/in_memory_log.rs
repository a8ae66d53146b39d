//! In-memory event log for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use propledger_core::{OrgId, TraceId};

use crate::error::EventError;
use crate::event::{DomainEvent, NewEvent};
use crate::log::EventLog;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    org_id: OrgId,
    aggregate_id: Uuid,
}

#[derive(Debug)]
struct StreamTail {
    aggregate_type: String,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    /// Append-ordered log across all streams (audit trail order).
    log: Vec<DomainEvent>,
    /// Per-stream tail: fixed aggregate type and last assigned sequence.
    streams: HashMap<StreamKey, StreamTail>,
}

/// In-memory append-only event log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    inner: RwLock<Inner>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let org_id = events[0].org_id;
        for (idx, e) in events.iter().enumerate() {
            if e.org_id != org_id {
                return Err(EventError::OrgIsolation(format!(
                    "batch contains multiple org_ids (index {idx})"
                )));
            }
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventError::InvalidAppend("lock poisoned".to_string()))?;

        // Validate aggregate type stability before mutating anything so a
        // rejected batch leaves the log untouched.
        let mut batch_types: HashMap<StreamKey, &str> = HashMap::new();
        for (idx, e) in events.iter().enumerate() {
            let key = StreamKey {
                org_id,
                aggregate_id: e.aggregate_id,
            };
            let fixed = inner
                .streams
                .get(&key)
                .map(|t| t.aggregate_type.as_str())
                .or_else(|| batch_types.get(&key).copied());

            match fixed {
                Some(fixed) if fixed != e.aggregate_type => {
                    return Err(EventError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{fixed}', attempted append with '{}' (index {idx})",
                        e.aggregate_type
                    )));
                }
                Some(_) => {}
                None => {
                    batch_types.insert(key, e.aggregate_type.as_str());
                }
            }
        }

        let mut appended = Vec::with_capacity(events.len());
        for e in events {
            let key = StreamKey {
                org_id,
                aggregate_id: e.aggregate_id,
            };
            let sequence = {
                let tail = inner.streams.entry(key).or_insert_with(|| StreamTail {
                    aggregate_type: e.aggregate_type.clone(),
                    version: 0,
                });
                tail.version += 1;
                tail.version
            };

            let stored = DomainEvent {
                event_id: Uuid::now_v7(),
                org_id: e.org_id,
                trace_id: e.trace_id,
                saga_id: e.saga_id,
                aggregate_type: e.aggregate_type,
                aggregate_id: e.aggregate_id,
                sequence,
                event_type: e.event_type,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            inner.log.push(stored.clone());
            appended.push(stored);
        }

        Ok(appended)
    }

    fn events_for_aggregate(
        &self,
        org_id: OrgId,
        aggregate_id: Uuid,
    ) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventError::InvalidAppend("lock poisoned".to_string()))?;

        // Appends happen under the write lock, so append order within one
        // stream is sequence order.
        Ok(inner
            .log
            .iter()
            .filter(|e| e.org_id == org_id && e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    fn events_for_trace(
        &self,
        org_id: OrgId,
        trace_id: TraceId,
    ) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(inner
            .log
            .iter()
            .filter(|e| e.org_id == org_id && e.trace_id == trace_id)
            .cloned()
            .collect())
    }

    fn events_for_org(&self, org_id: OrgId) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(inner
            .log
            .iter()
            .filter(|e| e.org_id == org_id)
            .cloned()
            .collect())
    }
}
