//! Append-only double-entry ledger.
//!
//! Journal entries are immutable once posted; the only correction path is a
//! reversing entry, and the only permitted mutation in the whole ledger is
//! setting the `reversed_by_id` link on the original, inside the same atomic
//! commit as the reversal. Balance projections are maintained in that commit
//! too, so balance reads are O(1) and always consistent with the journal.

pub mod balance;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod store;

pub use balance::{AccountBalance, BalanceScope, DimensionalBalance};
pub use entry::{
    Account, AccountKind, AccountingPeriod, Dimensions, JournalEntry, JournalPosting, NewEntry,
    SourceType,
};
pub use error::LedgerError;
pub use ledger::{
    ENTRY_AGGREGATE, ENTRY_POSTED, ENTRY_REVERSED, EntryPosted, EntryReversed, Ledger,
};
pub use store::{InMemoryLedgerStore, LedgerStore, ReversalLink};
