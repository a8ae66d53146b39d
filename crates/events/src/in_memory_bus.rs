//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};
use crate::error::EventError;
use crate::event::DomainEvent;

/// In-memory pub/sub bus.
///
/// - no IO, no async
/// - best-effort fan-out
/// - at-least-once acceptable (subscribers must be idempotent)
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<mpsc::Sender<DomainEvent>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| EventError::Publish("subscriber registry lock poisoned".to_string()))?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(event.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned we still return a subscription; it just
        // won't receive events until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
