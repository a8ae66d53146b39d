//! Tracing and logging setup shared by every process embedding the ledger.

pub mod tracing;

pub use tracing::{init, init_for_tests};
