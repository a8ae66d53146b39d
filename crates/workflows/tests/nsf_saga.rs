//! End-to-end returned-payment scenarios driven through the worker loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use propledger_compliance::{ComplianceResolver, ComplianceRule, InMemoryRuleSet, RuleValue};
use propledger_core::{EntryId, IdempotencyKey, Money, OrgId, PropertyId, TenantId, TraceId};
use propledger_events::{
    EventBus, EventLog, EventRecorder, EventSink, InMemoryEventBus, InMemoryEventLog, Subscription,
};
use propledger_ledger::{
    Account, AccountKind, BalanceScope, Dimensions, InMemoryLedgerStore, JournalEntry,
    JournalPosting, Ledger, NewEntry, SourceType,
};
use propledger_saga::{
    InMemorySagaStore, Orchestrator, SAGA_COMPLETED, SAGA_STARTED, SAGA_STEP_READY, SagaError,
    SagaRegistry, SagaStatus, SagaWorker,
};
use propledger_workflows::nsf::{self, NsfRequest};
use propledger_workflows::{
    InMemoryPaymentHistory, Notice, Notifier, NsfSagaHandler, PaymentHistoryStore,
    RecordingNotifier,
};

struct Platform {
    org_id: OrgId,
    ledger: Ledger,
    orchestrator: Orchestrator,
    worker: SagaWorker,
    log: Arc<dyn EventLog>,
    sub: Subscription,
    notifier: Arc<RecordingNotifier>,
    history: Arc<InMemoryPaymentHistory>,
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cash() -> Account {
    Account::new("1000", "Operating Cash", AccountKind::Asset)
}

fn receivable() -> Account {
    Account::new("1100", "Accounts Receivable", AccountKind::Asset)
}

fn nc_fee_rules() -> InMemoryRuleSet {
    InMemoryRuleSet::with_rules(vec![ComplianceRule::new(
        "NC",
        "fees",
        "nsf_fee_max",
        RuleValue::Amount(money("15.00")),
        date(2024, 7, 1),
    )])
}

fn platform(rules: InMemoryRuleSet, notifier_impl: Arc<dyn Notifier>) -> Platform {
    propledger_observability::init_for_tests();

    let org_id = OrgId::new();

    let ledger_store = Arc::new(InMemoryLedgerStore::new());
    let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
    let sub = bus.subscribe();
    let events: Arc<dyn EventSink> = Arc::new(EventRecorder::new(log.clone(), bus));

    let ledger = Ledger::new(org_id, ledger_store.clone(), events.clone());
    let compliance = ComplianceResolver::new(Arc::new(rules));

    let registry = Arc::new(SagaRegistry::new().with(nsf::definition()));
    let saga_store = Arc::new(InMemorySagaStore::new());
    let orchestrator = Orchestrator::new(org_id, saga_store, registry, events.clone());

    let history = Arc::new(InMemoryPaymentHistory::new());

    let handler = NsfSagaHandler::new(
        Ledger::new(org_id, ledger_store, events),
        compliance,
        orchestrator.clone(),
        notifier_impl,
        history.clone(),
    );
    let worker = SagaWorker::new(orchestrator.clone()).register(nsf::NSF_SAGA, handler);

    Platform {
        org_id,
        ledger,
        orchestrator,
        worker,
        log,
        sub,
        notifier: Arc::new(RecordingNotifier::new()),
        history,
    }
}

fn nc_platform() -> Platform {
    let notifier = Arc::new(RecordingNotifier::new());
    let mut platform = platform(nc_fee_rules(), notifier.clone());
    platform.notifier = notifier;
    platform
}

fn post_rent_payment(platform: &Platform, tenant: TenantId, property: PropertyId) -> JournalEntry {
    let dims = Dimensions::for_property(property).with_tenant(tenant);
    let amount = money("1500.00");

    platform
        .ledger
        .create_entry(
            NewEntry {
                effective_date: date(2025, 3, 1),
                description: "March rent payment".to_string(),
                source_type: SourceType::Payment,
                source_id: None,
                trace_id: TraceId::new(),
                created_by: None,
                postings: vec![
                    JournalPosting::new(cash(), amount).with_dimensions(dims),
                    JournalPosting::new(receivable(), -amount).with_dimensions(dims),
                ],
            },
            IdempotencyKey::new("rent-2025-03"),
        )
        .unwrap()
}

fn start_nsf(platform: &Platform, payment: EntryId, tenant: TenantId, property: PropertyId) -> propledger_saga::SagaState {
    nsf::start(
        &platform.orchestrator,
        NsfRequest {
            payment_entry_id: payment,
            tenant_id: tenant,
            property_id: property,
            jurisdiction: "NC".to_string(),
            requested_fee: Some(money("30.00")),
            timeout: Duration::from_secs(30 * 60),
        },
        TraceId::new(),
    )
    .unwrap()
}

/// Pump every pending bus event through the worker.
fn drive(platform: &mut Platform) {
    while let Ok(event) = platform.sub.try_recv() {
        platform.worker.process(&event).unwrap();
    }
}

#[test]
fn returned_payment_runs_to_completion() {
    let mut platform = nc_platform();
    let tenant = TenantId::new();
    let property = PropertyId::new();

    let payment = post_rent_payment(&platform, tenant, property);
    assert_eq!(platform.ledger.balance("1000").unwrap(), money("1500.00"));

    let saga = start_nsf(&platform, payment.id, tenant, property);
    drive(&mut platform);

    // Terminal state, fee capped by the NC ceiling and reported at
    // presentation precision.
    let finished = platform.orchestrator.saga(saga.id).unwrap();
    assert_eq!(finished.status, SagaStatus::Completed);
    let result = finished.result.unwrap();
    assert_eq!(result["fee_amount"], json!("15.00"));

    // Exactly one reversal, linked in both directions, cash restored.
    let original = platform.ledger.entry(payment.id).unwrap();
    let reversal_id = original.reversed_by_id.unwrap();
    let reversal = platform.ledger.entry(reversal_id).unwrap();
    assert_eq!(reversal.reverses_id, Some(payment.id));
    assert_eq!(reversal.source_type, SourceType::Reversal);
    assert!(reversal.posting_total().is_zero());
    assert_eq!(platform.ledger.balance("1000").unwrap(), Money::ZERO);

    let result_reversal: EntryId =
        serde_json::from_value(result["reversal_entry_id"].clone()).unwrap();
    assert_eq!(result_reversal, reversal_id);

    // The fee entry balances: $15 receivable against $15 fee income.
    let fee_entry_id: EntryId = serde_json::from_value(result["fee_entry_id"].clone()).unwrap();
    let fee_entry = platform.ledger.entry(fee_entry_id).unwrap();
    assert!(fee_entry.posting_total().is_zero());
    assert_eq!(fee_entry.source_type, SourceType::Fee);
    assert_eq!(platform.ledger.balance("1100").unwrap(), money("15.00"));
    assert_eq!(platform.ledger.balance("4200").unwrap(), money("-15.00"));
    assert_eq!(
        platform
            .ledger
            .dimensional_balance(BalanceScope::Tenant(tenant), Some("1100"))
            .unwrap(),
        money("15.00")
    );

    // Collaborators saw exactly one episode.
    let notices = platform.notifier.sent();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].tenant_id, tenant);
    assert!(notices[0].body.contains("15.00"));

    let records = platform
        .history
        .tenant_history(platform.org_id, tenant)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fee_amount, money("15.00"));
    assert_eq!(records[0].reversal_entry_id, reversal_id);
    assert_eq!(records[0].fee_entry_id, fee_entry_id);

    // The saga stream tells the whole story in order.
    let saga_events = platform
        .log
        .events_for_aggregate(platform.org_id, *saga.id.as_uuid())
        .unwrap();
    let types: Vec<_> = saga_events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            SAGA_STARTED,
            SAGA_STEP_READY,
            SAGA_STEP_READY,
            SAGA_STEP_READY,
            SAGA_STEP_READY,
            SAGA_STEP_READY,
            SAGA_COMPLETED,
        ]
    );
    assert!(saga_events.iter().all(|e| e.saga_id == Some(saga.id)));
}

#[test]
fn requested_fee_below_the_ceiling_is_kept() {
    let mut platform = nc_platform();
    let tenant = TenantId::new();
    let property = PropertyId::new();
    let payment = post_rent_payment(&platform, tenant, property);

    let saga = nsf::start(
        &platform.orchestrator,
        NsfRequest {
            payment_entry_id: payment.id,
            tenant_id: tenant,
            property_id: property,
            jurisdiction: "NC".to_string(),
            requested_fee: Some(money("10.00")),
            timeout: Duration::from_secs(30 * 60),
        },
        TraceId::new(),
    )
    .unwrap();
    drive(&mut platform);

    let finished = platform.orchestrator.saga(saga.id).unwrap();
    assert_eq!(finished.status, SagaStatus::Completed);
    assert_eq!(finished.result.unwrap()["fee_amount"], json!("10.00"));
    assert_eq!(platform.ledger.balance("1100").unwrap(), money("10.00"));
}

#[test]
fn advancing_out_of_order_is_rejected() {
    let platform = nc_platform();
    let tenant = TenantId::new();
    let property = PropertyId::new();
    let payment = post_rent_payment(&platform, tenant, property);

    let saga = start_nsf(&platform, payment.id, tenant, property);

    // post_fee before calculate_fee has run.
    assert!(matches!(
        platform
            .orchestrator
            .advance(saga.id, nsf::STEP_POST_FEE, json!({})),
        Err(SagaError::InvalidSagaState { .. })
    ));
}

#[test]
fn missing_fee_rule_fails_the_saga_after_the_reversal() {
    let notifier = Arc::new(RecordingNotifier::new());
    let mut platform = platform(InMemoryRuleSet::new(), notifier);
    let tenant = TenantId::new();
    let property = PropertyId::new();
    let payment = post_rent_payment(&platform, tenant, property);

    let saga = start_nsf(&platform, payment.id, tenant, property);
    drive(&mut platform);

    let failed = platform.orchestrator.saga(saga.id).unwrap();
    assert_eq!(failed.status, SagaStatus::Failed);
    assert!(failed.error.unwrap().contains("nsf_fee_max"));

    // The reversal committed before the failing step; no fee was posted.
    let original = platform.ledger.entry(payment.id).unwrap();
    assert!(original.reversed_by_id.is_some());
    assert_eq!(platform.ledger.balance("1000").unwrap(), Money::ZERO);
    assert_eq!(platform.ledger.balance("1100").unwrap(), Money::ZERO);
    assert_eq!(platform.ledger.balance("4200").unwrap(), Money::ZERO);
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notice: &Notice) -> anyhow::Result<()> {
        anyhow::bail!("smtp relay unavailable")
    }
}

#[test]
fn notification_failure_never_blocks_completion() {
    let mut platform = platform(nc_fee_rules(), Arc::new(FailingNotifier));
    let tenant = TenantId::new();
    let property = PropertyId::new();
    let payment = post_rent_payment(&platform, tenant, property);

    let saga = start_nsf(&platform, payment.id, tenant, property);
    drive(&mut platform);

    let finished = platform.orchestrator.saga(saga.id).unwrap();
    assert_eq!(finished.status, SagaStatus::Completed);
    assert_eq!(
        platform
            .history
            .tenant_history(platform.org_id, tenant)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn fee_posting_replays_instead_of_double_charging() {
    let mut platform = nc_platform();
    let tenant = TenantId::new();
    let property = PropertyId::new();
    let payment = post_rent_payment(&platform, tenant, property);

    let saga = start_nsf(&platform, payment.id, tenant, property);
    drive(&mut platform);

    let result = platform.orchestrator.saga(saga.id).unwrap().result.unwrap();
    let fee_entry_id: EntryId = serde_json::from_value(result["fee_entry_id"].clone()).unwrap();
    let fee_entry = platform.ledger.entry(fee_entry_id).unwrap();

    // A crashed worker retrying the fee posting supplies the same derived
    // key and gets the committed entry back.
    let replayed = platform
        .ledger
        .create_entry(
            NewEntry {
                effective_date: fee_entry.effective_date,
                description: fee_entry.description.clone(),
                source_type: SourceType::Fee,
                source_id: fee_entry.source_id,
                trace_id: TraceId::new(),
                created_by: None,
                postings: fee_entry.postings.clone(),
            },
            IdempotencyKey::new(format!("nsf-fee-{}", payment.id)),
        )
        .unwrap();

    assert_eq!(replayed.id, fee_entry_id);
    assert_eq!(platform.ledger.balance("1100").unwrap(), money("15.00"));
}
