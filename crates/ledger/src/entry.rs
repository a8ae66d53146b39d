use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use propledger_core::{
    EntryId, IdempotencyKey, Money, OrgId, OwnerId, PropertyId, TenantId, TraceId, UnitId, UserId,
    VendorId,
};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "1000"
    pub name: String, // e.g. "Operating Cash"
    pub kind: AccountKind,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

/// What produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Payment,
    Invoice,
    Fee,
    Deposit,
    Adjustment,
    Reversal,
    Manual,
}

/// Calendar year-month an entry's effective date falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountingPeriod {
    pub year: i32,
    pub month: u32,
}

impl AccountingPeriod {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl core::fmt::Display for AccountingPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Optional business dimensions tagged onto a posting.
///
/// Each populated dimension produces one dimensional balance slice for the
/// posting's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub property_id: Option<PropertyId>,
    pub unit_id: Option<UnitId>,
    pub tenant_id: Option<TenantId>,
    pub vendor_id: Option<VendorId>,
    pub owner_id: Option<OwnerId>,
}

impl Dimensions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_property(property_id: PropertyId) -> Self {
        Self {
            property_id: Some(property_id),
            ..Self::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_unit(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_vendor(mut self, vendor_id: VendorId) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }
}

/// One line of a journal entry (immutable).
///
/// `amount` is signed: positive = debit, negative = credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalPosting {
    pub account: Account,
    pub amount: Money,
    pub dimensions: Dimensions,
    pub memo: Option<String>,
}

impl JournalPosting {
    pub fn new(account: Account, amount: Money) -> Self {
        Self {
            account,
            amount,
            dimensions: Dimensions::none(),
            memo: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Input for posting a new journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub effective_date: NaiveDate,
    pub description: String,
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,
    pub trace_id: TraceId,
    pub created_by: Option<UserId>,
    pub postings: Vec<JournalPosting>,
}

/// An immutable journal entry header with its postings.
///
/// Once committed no field changes, with one audited exception:
/// `reversed_by_id` is set exactly once when the entry is reversed, inside
/// the reversal's own atomic commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub org_id: OrgId,

    pub period: AccountingPeriod,
    pub entry_date: DateTime<Utc>,
    pub effective_date: NaiveDate,

    pub description: String,
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,

    pub idempotency_key: IdempotencyKey,
    pub trace_id: TraceId,

    /// Set on a reversal: the entry it undoes.
    pub reverses_id: Option<EntryId>,
    /// Set once on the original when a reversal commits.
    pub reversed_by_id: Option<EntryId>,

    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,

    pub postings: Vec<JournalPosting>,
}

impl JournalEntry {
    /// Exact signed total of the postings. Zero for every committed entry.
    pub fn posting_total(&self) -> Money {
        self.postings.iter().map(|p| p.amount).sum()
    }
}
