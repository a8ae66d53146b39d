use thiserror::Error;

use propledger_core::{EntryId, Money};
use propledger_events::EventError;

/// Ledger operation error.
///
/// Validation failures carry enough detail for the caller to act on (the
/// actual residual, the reversing entry id). None of them are ever
/// auto-corrected.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("journal entry must contain at least one posting")]
    EmptyEntry,

    #[error("posting amounts must sum to exactly zero (residual {residual})")]
    UnbalancedEntry { residual: Money },

    #[error("posting amount must be nonzero (line {index})")]
    ZeroAmountPosting { index: usize },

    #[error("journal entry {entry_id} not found")]
    EntryNotFound { entry_id: EntryId },

    #[error("journal entry {entry_id} already reversed by {reversed_by}")]
    AlreadyReversed {
        entry_id: EntryId,
        reversed_by: EntryId,
    },

    #[error("ledger storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Event(#[from] EventError),
}
