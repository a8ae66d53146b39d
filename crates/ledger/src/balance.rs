//! Pre-aggregated balance projections.
//!
//! Rows here are upserted inside the same atomic commit as the postings
//! that produce them and never mutated independently. Reads are O(1)
//! lookups; balances are never computed by summing postings at read time.

use serde::{Deserialize, Serialize};

use propledger_core::{Money, OwnerId, PropertyId, TenantId, UnitId, VendorId};

use crate::entry::{AccountKind, Dimensions};

/// One business dimension to slice balances by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "id", rename_all = "snake_case")]
pub enum BalanceScope {
    Property(PropertyId),
    Unit(UnitId),
    Tenant(TenantId),
    Vendor(VendorId),
    Owner(OwnerId),
}

impl BalanceScope {
    /// Every scope a posting's dimensions contribute to.
    pub fn from_dimensions(dimensions: &Dimensions) -> Vec<BalanceScope> {
        let mut scopes = Vec::new();
        if let Some(id) = dimensions.property_id {
            scopes.push(BalanceScope::Property(id));
        }
        if let Some(id) = dimensions.unit_id {
            scopes.push(BalanceScope::Unit(id));
        }
        if let Some(id) = dimensions.tenant_id {
            scopes.push(BalanceScope::Tenant(id));
        }
        if let Some(id) = dimensions.vendor_id {
            scopes.push(BalanceScope::Vendor(id));
        }
        if let Some(id) = dimensions.owner_id {
            scopes.push(BalanceScope::Owner(id));
        }
        scopes
    }
}

/// Running balance for one account (debit-positive convention).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_code: String,
    pub account_name: String,
    pub kind: AccountKind,
    pub balance: Money,
}

/// Running balance for one account sliced by one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionalBalance {
    pub account_code: String,
    pub scope: BalanceScope,
    pub balance: Money,
}
