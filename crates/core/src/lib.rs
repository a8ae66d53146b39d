//! Shared domain primitives for the financial core.
//!
//! Strongly-typed identifiers, the money type, and the base error model.
//! No infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{
    EntryId, IdempotencyKey, OrgId, OwnerId, PropertyId, SagaId, TenantId, TraceId, UnitId,
    UserId, VendorId,
};
pub use money::Money;
