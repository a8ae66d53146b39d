//! Trust-accounting distribution guard.
//!
//! Pure functions deciding how much of a property's (or owner's) trust
//! funds may safely be distributed, and refusing any movement of funds
//! across scopes. Every number comes from ledger balance reads; nothing
//! here mutates state.

pub mod balance;
pub mod error;
pub mod guard;

pub use balance::{PropertyBalance, TrustAccounts, TrustScope};
pub use error::TrustError;
pub use guard::{distributable, validate_cross_scope_transfer, validate_distribution};
