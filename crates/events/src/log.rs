use std::sync::Arc;

use uuid::Uuid;

use propledger_core::{OrgId, TraceId};

use crate::error::EventError;
use crate::event::{DomainEvent, NewEvent};

/// Append-only, organization-scoped event log.
///
/// Events are organized into streams, one per aggregate instance, keyed by
/// `(org_id, aggregate_id)`. Within a stream, sequence numbers increase
/// monotonically with no gaps.
///
/// Append semantics:
/// - all events in a batch must belong to the same organization
/// - a batch may span aggregates; each event gets the next sequence
///   number of its own stream
/// - an aggregate's type is fixed by its first event and enforced on
///   every later append
/// - the batch is all-or-nothing
pub trait EventLog: Send + Sync {
    /// Append a batch of events, assigning ids and sequence numbers.
    fn append(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError>;

    /// All events for one aggregate, in sequence order.
    fn events_for_aggregate(
        &self,
        org_id: OrgId,
        aggregate_id: Uuid,
    ) -> Result<Vec<DomainEvent>, EventError>;

    /// Every event carrying one trace id, in append order.
    ///
    /// Reconstructs a business transaction end to end across the ledger,
    /// orchestrator, and workflow steps that shared the trace.
    fn events_for_trace(
        &self,
        org_id: OrgId,
        trace_id: TraceId,
    ) -> Result<Vec<DomainEvent>, EventError>;

    /// The organization's full audit trail, in append order.
    fn events_for_org(&self, org_id: OrgId) -> Result<Vec<DomainEvent>, EventError>;
}

impl<L> EventLog for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn append(&self, events: Vec<NewEvent>) -> Result<Vec<DomainEvent>, EventError> {
        (**self).append(events)
    }

    fn events_for_aggregate(
        &self,
        org_id: OrgId,
        aggregate_id: Uuid,
    ) -> Result<Vec<DomainEvent>, EventError> {
        (**self).events_for_aggregate(org_id, aggregate_id)
    }

    fn events_for_trace(
        &self,
        org_id: OrgId,
        trace_id: TraceId,
    ) -> Result<Vec<DomainEvent>, EventError> {
        (**self).events_for_trace(org_id, trace_id)
    }

    fn events_for_org(&self, org_id: OrgId) -> Result<Vec<DomainEvent>, EventError> {
        (**self).events_for_org(org_id)
    }
}
