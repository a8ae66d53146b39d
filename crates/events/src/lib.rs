//! Append-only domain event log and in-process pub/sub.
//!
//! Every state change in the financial core is recorded here after it
//! commits: the log is the audit trail, the bus is best-effort fan-out to
//! in-process consumers (saga workers, projections). Consumers must be
//! idempotent; the log, not the bus, is the source of truth.

pub mod bus;
pub mod error;
pub mod event;
pub mod in_memory_bus;
pub mod in_memory_log;
pub mod log;
pub mod recorder;

pub use bus::{EventBus, Subscription};
pub use error::EventError;
pub use event::{DomainEvent, NewEvent};
pub use in_memory_bus::InMemoryEventBus;
pub use in_memory_log::InMemoryEventLog;
pub use log::EventLog;
pub use recorder::{EventRecorder, EventSink};
