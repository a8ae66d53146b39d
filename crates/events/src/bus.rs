//! Event distribution (mechanics only).
//!
//! The bus sits after the log: events are appended first, then published.
//! Delivery is at-least-once and best-effort; a consumer that misses an
//! event recovers by re-reading the log. Consumers must be idempotent.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::error::EventError;
use crate::event::DomainEvent;

/// A subscription to published events.
///
/// Each subscription receives a copy of every event published after it was
/// created (broadcast semantics). Designed for single-threaded consumption:
/// one subscription per consumer thread.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<DomainEvent>,
}

impl Subscription {
    pub fn new(receiver: Receiver<DomainEvent>) -> Self {
        Self { receiver }
    }

    /// Block until the next event is available.
    pub fn recv(&self) -> Result<DomainEvent, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Result<DomainEvent, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<DomainEvent, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Pub/sub transport for committed domain events.
///
/// Transport-agnostic: in-memory channels here, a broker in production.
/// No persistence; the event log is the source of truth.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: DomainEvent) -> Result<(), EventError>;

    fn subscribe(&self) -> Subscription;
}

impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        (**self).publish(event)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
