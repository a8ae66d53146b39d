use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use propledger_core::{OrgId, SagaId, TraceId};

use crate::error::EventError;

/// An event ready to be appended to the log (no identity or sequence yet).
///
/// The log assigns `event_id` and the per-aggregate `sequence` during
/// append. Callers supply `occurred_at` (business time) so replays and
/// tests stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub org_id: OrgId,
    pub trace_id: TraceId,
    pub saga_id: Option<SagaId>,

    pub aggregate_type: String,
    pub aggregate_id: Uuid,

    /// Stable event name (e.g. "ledger.entry_posted").
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl NewEvent {
    pub fn new(
        org_id: OrgId,
        trace_id: TraceId,
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            org_id,
            trace_id,
            saga_id: None,
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    /// Tag the event with the saga instance that produced it.
    pub fn for_saga(mut self, saga_id: SagaId) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    /// Construct from a typed payload, serializing it to JSON.
    pub fn from_typed<P: Serialize>(
        org_id: OrgId,
        trace_id: TraceId,
        aggregate_type: impl Into<String>,
        aggregate_id: Uuid,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: &P,
    ) -> Result<Self, EventError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| EventError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self::new(
            org_id,
            trace_id,
            aggregate_type,
            aggregate_id,
            event_type,
            occurred_at,
            payload,
        ))
    }
}

/// An event that has been appended to the log.
///
/// `sequence` is assigned by the log and is monotonically increasing per
/// aggregate stream (1, 2, 3, ...). Once assigned it never changes; the
/// log is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub org_id: OrgId,
    pub trace_id: TraceId,
    pub saga_id: Option<SagaId>,

    pub aggregate_type: String,
    pub aggregate_id: Uuid,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence: u64,

    pub event_type: String,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl DomainEvent {
    /// Decode the JSON payload into a typed value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
