//! Concrete saga definitions for the platform's financial workflows.

pub mod history;
pub mod notify;
pub mod nsf;

pub use history::{InMemoryPaymentHistory, PaymentHistoryStore, ReturnedPaymentRecord};
pub use notify::{Notice, Notifier, RecordingNotifier};
pub use nsf::{NSF_SAGA, NsfAccounts, NsfOutcome, NsfPayload, NsfRequest, NsfSagaHandler};
