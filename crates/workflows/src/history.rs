//! Tenant-facing payment history.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propledger_core::{EntryId, Money, OrgId, PropertyId, TenantId};

/// One returned-payment episode as the tenant's history shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedPaymentRecord {
    pub org_id: OrgId,
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub payment_entry_id: EntryId,
    pub reversal_entry_id: EntryId,
    pub fee_entry_id: EntryId,
    pub fee_amount: Money,
    pub recorded_at: DateTime<Utc>,
}

/// Store behind the tenant payment-history view.
pub trait PaymentHistoryStore: Send + Sync {
    fn record_returned_payment(&self, record: ReturnedPaymentRecord) -> anyhow::Result<()>;

    fn tenant_history(
        &self,
        org_id: OrgId,
        tenant_id: TenantId,
    ) -> anyhow::Result<Vec<ReturnedPaymentRecord>>;
}

/// In-memory history for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryPaymentHistory {
    records: Mutex<Vec<ReturnedPaymentRecord>>,
}

impl InMemoryPaymentHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentHistoryStore for InMemoryPaymentHistory {
    fn record_returned_payment(&self, record: ReturnedPaymentRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?
            .push(record);
        Ok(())
    }

    fn tenant_history(
        &self,
        org_id: OrgId,
        tenant_id: TenantId,
    ) -> anyhow::Result<Vec<ReturnedPaymentRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?;

        Ok(records
            .iter()
            .filter(|r| r.org_id == org_id && r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(org_id: OrgId, tenant_id: TenantId) -> ReturnedPaymentRecord {
        ReturnedPaymentRecord {
            org_id,
            tenant_id,
            property_id: PropertyId::new(),
            payment_entry_id: EntryId::new(),
            reversal_entry_id: EntryId::new(),
            fee_entry_id: EntryId::new(),
            fee_amount: "15.00".parse().unwrap(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn history_is_scoped_to_org_and_tenant() {
        let history = InMemoryPaymentHistory::new();
        let org = OrgId::new();
        let tenant = TenantId::new();

        history
            .record_returned_payment(test_record(org, tenant))
            .unwrap();
        history
            .record_returned_payment(test_record(org, TenantId::new()))
            .unwrap();
        history
            .record_returned_payment(test_record(OrgId::new(), tenant))
            .unwrap();

        assert_eq!(history.tenant_history(org, tenant).unwrap().len(), 1);
    }
}
