//! Returned-payment (NSF) handling saga.
//!
//! Steps, in order: reverse the original payment entry, look up the
//! jurisdiction's fee ceiling, post the fee entry, notify the tenant, and
//! record the episode in payment history. The reversal is itself the
//! compensating action for the payment, so a failure after it leaves the
//! books correct; the fee posting carries an idempotency key derived from
//! the payment entry so a crash-and-retry can never double-charge.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use propledger_compliance::{ComplianceResolver, Jurisdiction};
use propledger_core::{EntryId, IdempotencyKey, Money, PropertyId, TenantId, TraceId};
use propledger_ledger::{
    Account, AccountKind, Dimensions, JournalPosting, Ledger, NewEntry, SourceType,
};
use propledger_saga::{Orchestrator, SagaDefinition, SagaError, SagaHandler, SagaState};

use crate::history::{PaymentHistoryStore, ReturnedPaymentRecord};
use crate::notify::{Notice, Notifier};

pub const NSF_SAGA: &str = "nsf_payment";

pub const STEP_REVERSE_PAYMENT: &str = "reverse_payment";
pub const STEP_CALCULATE_FEE: &str = "calculate_fee";
pub const STEP_POST_FEE: &str = "post_fee";
pub const STEP_NOTIFY_TENANT: &str = "notify_tenant";
pub const STEP_UPDATE_HISTORY: &str = "update_history";

const FEE_RULE_TYPE: &str = "fees";
const FEE_RULE_KEY: &str = "nsf_fee_max";

pub fn definition() -> SagaDefinition {
    SagaDefinition::new(
        NSF_SAGA,
        [
            STEP_REVERSE_PAYMENT,
            STEP_CALCULATE_FEE,
            STEP_POST_FEE,
            STEP_NOTIFY_TENANT,
            STEP_UPDATE_HISTORY,
        ],
    )
}

/// Typed payload for the NSF saga.
///
/// The optional trailing fields are produced by the steps in order; each
/// step validates that its predecessors' fields are present before doing
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsfPayload {
    pub payment_entry_id: EntryId,
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub jurisdiction: String,
    /// Fee the operator wants to charge; the jurisdiction ceiling caps it.
    #[serde(default)]
    pub requested_fee: Option<Money>,

    #[serde(default)]
    pub reversal_entry_id: Option<EntryId>,
    #[serde(default)]
    pub fee_amount: Option<Money>,
    #[serde(default)]
    pub fee_entry_id: Option<EntryId>,
}

impl NsfPayload {
    fn reversal_entry(&self) -> anyhow::Result<EntryId> {
        self.reversal_entry_id
            .context("reverse_payment has not recorded a reversal entry")
    }

    fn fee(&self) -> anyhow::Result<Money> {
        self.fee_amount
            .context("calculate_fee has not recorded a fee amount")
    }

    fn fee_entry(&self) -> anyhow::Result<EntryId> {
        self.fee_entry_id
            .context("post_fee has not recorded a fee entry")
    }
}

/// Everything needed to kick off NSF handling for a returned payment.
#[derive(Debug, Clone)]
pub struct NsfRequest {
    pub payment_entry_id: EntryId,
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub jurisdiction: String,
    pub requested_fee: Option<Money>,
    pub timeout: Duration,
}

/// Start the saga at its first step.
pub fn start(
    orchestrator: &Orchestrator,
    request: NsfRequest,
    trace_id: TraceId,
) -> Result<SagaState, SagaError> {
    let payload = NsfPayload {
        payment_entry_id: request.payment_entry_id,
        tenant_id: request.tenant_id,
        property_id: request.property_id,
        jurisdiction: request.jurisdiction,
        requested_fee: request.requested_fee,
        reversal_entry_id: None,
        fee_amount: None,
        fee_entry_id: None,
    };
    let payload = serde_json::to_value(&payload).map_err(|e| SagaError::Payload(e.to_string()))?;

    orchestrator.start(
        NSF_SAGA,
        STEP_REVERSE_PAYMENT,
        payload,
        trace_id,
        request.timeout,
    )
}

/// Chart accounts the fee entry posts against.
#[derive(Debug, Clone)]
pub struct NsfAccounts {
    pub receivable: Account,
    pub fee_income: Account,
}

impl Default for NsfAccounts {
    fn default() -> Self {
        Self {
            receivable: Account::new("1100", "Accounts Receivable", AccountKind::Asset),
            fee_income: Account::new("4200", "NSF Fee Income", AccountKind::Revenue),
        }
    }
}

/// Terminal summary recorded as the saga result.
///
/// `fee_amount` is rendered at two decimals (banker's rounding) because
/// the result payload is an outward-facing artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsfOutcome {
    pub reversal_entry_id: EntryId,
    pub fee_entry_id: EntryId,
    pub fee_amount: String,
}

/// Executes NSF saga steps against the ledger, the compliance table, and
/// the tenant-facing collaborators.
///
/// Each step performs its side effect and then advances the saga; the
/// advance is what marks the step done, so the side effects themselves
/// stay idempotent under redelivery.
pub struct NsfSagaHandler {
    ledger: Ledger,
    compliance: ComplianceResolver,
    orchestrator: Orchestrator,
    accounts: NsfAccounts,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn PaymentHistoryStore>,
}

impl NsfSagaHandler {
    pub fn new(
        ledger: Ledger,
        compliance: ComplianceResolver,
        orchestrator: Orchestrator,
        notifier: Arc<dyn Notifier>,
        history: Arc<dyn PaymentHistoryStore>,
    ) -> Self {
        Self {
            ledger,
            compliance,
            orchestrator,
            accounts: NsfAccounts::default(),
            notifier,
            history,
        }
    }

    pub fn with_accounts(mut self, accounts: NsfAccounts) -> Self {
        self.accounts = accounts;
        self
    }

    fn reverse_payment(&self, saga: &SagaState, payload: &NsfPayload) -> anyhow::Result<()> {
        let key = IdempotencyKey::new(format!("nsf-reverse-{}", payload.payment_entry_id));
        let reversal = self.ledger.reverse_entry(
            payload.payment_entry_id,
            "payment returned",
            key,
            saga.trace_id,
        )?;

        info!(saga = %saga.id, reversal = %reversal.id, "returned payment reversed");
        self.orchestrator.advance(
            saga.id,
            STEP_CALCULATE_FEE,
            json!({ "reversal_entry_id": reversal.id }),
        )?;
        Ok(())
    }

    fn calculate_fee(&self, saga: &SagaState, payload: &NsfPayload) -> anyhow::Result<()> {
        payload.reversal_entry()?;

        let jurisdiction = Jurisdiction::from(payload.jurisdiction.as_str());
        let ceiling = self.compliance.amount(
            &jurisdiction,
            FEE_RULE_TYPE,
            FEE_RULE_KEY,
            Utc::now().date_naive(),
        )?;
        let fee = match payload.requested_fee {
            Some(requested) => requested.min(ceiling),
            None => ceiling,
        };

        info!(saga = %saga.id, %fee, %ceiling, "returned-payment fee calculated");
        self.orchestrator
            .advance(saga.id, STEP_POST_FEE, json!({ "fee_amount": fee }))?;
        Ok(())
    }

    fn post_fee(&self, saga: &SagaState, payload: &NsfPayload) -> anyhow::Result<()> {
        let fee = payload.fee()?;
        let dimensions =
            Dimensions::for_property(payload.property_id).with_tenant(payload.tenant_id);

        // A crash-and-retry of this step replays the same key instead of
        // double-charging.
        let key = IdempotencyKey::new(format!("nsf-fee-{}", payload.payment_entry_id));
        let entry = self.ledger.create_entry(
            NewEntry {
                effective_date: Utc::now().date_naive(),
                description: "Returned payment fee".to_string(),
                source_type: SourceType::Fee,
                source_id: Some(*payload.payment_entry_id.as_uuid()),
                trace_id: saga.trace_id,
                created_by: None,
                postings: vec![
                    JournalPosting::new(self.accounts.receivable.clone(), fee)
                        .with_dimensions(dimensions),
                    JournalPosting::new(self.accounts.fee_income.clone(), -fee)
                        .with_dimensions(dimensions),
                ],
            },
            key,
        )?;

        info!(saga = %saga.id, entry = %entry.id, %fee, "returned-payment fee posted");
        self.orchestrator
            .advance(saga.id, STEP_NOTIFY_TENANT, json!({ "fee_entry_id": entry.id }))?;
        Ok(())
    }

    fn notify_tenant(&self, saga: &SagaState, payload: &NsfPayload) -> anyhow::Result<()> {
        let fee = payload.fee()?;

        // Fire-and-forget: delivery failure is logged and never blocks the
        // saga.
        let notice = Notice {
            org_id: saga.org_id,
            tenant_id: payload.tenant_id,
            subject: "Returned payment".to_string(),
            body: format!(
                "Your payment was returned by the bank. A returned-payment fee of {} has been applied to your account.",
                fee.rounded()
            ),
            trace_id: saga.trace_id,
        };
        if let Err(err) = self.notifier.notify(&notice) {
            warn!(
                saga = %saga.id,
                tenant = %payload.tenant_id,
                error = %err,
                "tenant notification failed"
            );
        }

        self.orchestrator
            .advance(saga.id, STEP_UPDATE_HISTORY, serde_json::Value::Null)?;
        Ok(())
    }

    fn update_history(&self, saga: &SagaState, payload: &NsfPayload) -> anyhow::Result<()> {
        let reversal_entry_id = payload.reversal_entry()?;
        let fee = payload.fee()?;
        let fee_entry_id = payload.fee_entry()?;

        self.history.record_returned_payment(ReturnedPaymentRecord {
            org_id: saga.org_id,
            tenant_id: payload.tenant_id,
            property_id: payload.property_id,
            payment_entry_id: payload.payment_entry_id,
            reversal_entry_id,
            fee_entry_id,
            fee_amount: fee,
            recorded_at: Utc::now(),
        })?;

        let outcome = NsfOutcome {
            reversal_entry_id,
            fee_entry_id,
            fee_amount: format!("{}", fee.rounded()),
        };
        self.orchestrator
            .complete(saga.id, serde_json::to_value(&outcome)?)?;

        info!(saga = %saga.id, "returned payment handled");
        Ok(())
    }
}

impl SagaHandler for NsfSagaHandler {
    fn execute_step(&mut self, saga: &SagaState, step: &str) -> anyhow::Result<()> {
        let payload: NsfPayload = serde_json::from_value(saga.payload.clone())
            .context("nsf payload failed validation")?;

        match step {
            STEP_REVERSE_PAYMENT => self.reverse_payment(saga, &payload),
            STEP_CALCULATE_FEE => self.calculate_fee(saga, &payload),
            STEP_POST_FEE => self.post_fee(saga, &payload),
            STEP_NOTIFY_TENANT => self.notify_tenant(saga, &payload),
            STEP_UPDATE_HISTORY => self.update_history(saga, &payload),
            other => anyhow::bail!("nsf saga has no step named {other}"),
        }
    }
}
