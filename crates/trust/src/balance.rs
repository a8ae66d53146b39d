use serde::{Deserialize, Serialize};

use propledger_core::{Money, OwnerId, PropertyId};
use propledger_ledger::{BalanceScope, Ledger};

use crate::error::TrustError;

/// The scope trust funds are held for. Funds never cross scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum TrustScope {
    Property(PropertyId),
    Owner(OwnerId),
}

impl core::fmt::Display for TrustScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TrustScope::Property(id) => write!(f, "property {id}"),
            TrustScope::Owner(id) => write!(f, "owner {id}"),
        }
    }
}

/// Chart-of-account mapping for the components of a trust balance view.
///
/// The guard never hardcodes account codes; each deployment names its own
/// chart here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAccounts {
    pub cash: String,
    pub cash_pending: String,
    pub reserve: String,
    pub pending_bills: String,
    pub security_deposits: String,
    pub prepaid_rent: String,
}

impl Default for TrustAccounts {
    fn default() -> Self {
        Self {
            cash: "1000".to_string(),
            cash_pending: "1010".to_string(),
            reserve: "2500".to_string(),
            pending_bills: "2100".to_string(),
            security_deposits: "2200".to_string(),
            prepaid_rent: "2300".to_string(),
        }
    }
}

impl TrustAccounts {
    pub fn with_cash(mut self, code: impl Into<String>) -> Self {
        self.cash = code.into();
        self
    }

    pub fn with_reserve(mut self, code: impl Into<String>) -> Self {
        self.reserve = code.into();
        self
    }

    pub fn with_security_deposits(mut self, code: impl Into<String>) -> Self {
        self.security_deposits = code.into();
        self
    }
}

/// Snapshot of one property's trust position, assembled from ledger reads.
///
/// All components are positive magnitudes: the obligation components
/// (reserve, bills, deposits, prepaid rent) are negated from their
/// credit-negative ledger projections during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyBalance {
    pub cash_settled: Money,
    pub cash_pending: Money,
    pub reserve_required: Money,
    pub pending_bills: Money,
    pub security_deposits_held: Money,
    pub prepaid_rent_liability: Money,
}

impl PropertyBalance {
    /// Assemble the view from the property's dimensional balances.
    pub fn from_ledger(
        ledger: &Ledger,
        property_id: PropertyId,
        accounts: &TrustAccounts,
    ) -> Result<Self, TrustError> {
        let scope = BalanceScope::Property(property_id);
        let read = |code: &str| ledger.dimensional_balance(scope, Some(code));

        Ok(Self {
            cash_settled: read(&accounts.cash)?,
            cash_pending: read(&accounts.cash_pending)?,
            reserve_required: -read(&accounts.reserve)?,
            pending_bills: -read(&accounts.pending_bills)?,
            security_deposits_held: -read(&accounts.security_deposits)?,
            prepaid_rent_liability: -read(&accounts.prepaid_rent)?,
        })
    }
}
