use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use propledger_core::{EntryId, IdempotencyKey, Money, OrgId, TraceId};
use propledger_events::{EventSink, NewEvent};

use crate::balance::BalanceScope;
use crate::entry::{AccountingPeriod, JournalEntry, JournalPosting, NewEntry, SourceType};
use crate::error::LedgerError;
use crate::store::{LedgerStore, ReversalLink};

pub const ENTRY_AGGREGATE: &str = "ledger.entry";
pub const ENTRY_POSTED: &str = "ledger.entry_posted";
pub const ENTRY_REVERSED: &str = "ledger.entry_reversed";

/// Payload of `ledger.entry_posted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub entry_id: EntryId,
    pub source_type: SourceType,
    pub description: String,
    pub reverses_id: Option<EntryId>,
}

/// Payload of `ledger.entry_reversed`, appended to the original entry's
/// stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReversed {
    pub entry_id: EntryId,
    pub reversed_by_id: EntryId,
    pub reason: String,
}

/// Double-entry journal scoped to one organization.
///
/// A `Ledger` value is constructed per organization and threaded through
/// call sites; there are no process-wide instances. All writes go through
/// the store's atomic commit; every committed write emits a domain event
/// carrying the caller's trace id.
pub struct Ledger {
    org_id: OrgId,
    store: Arc<dyn LedgerStore>,
    events: Arc<dyn EventSink>,
}

impl Ledger {
    pub fn new(org_id: OrgId, store: Arc<dyn LedgerStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            org_id,
            store,
            events,
        }
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Post a balanced journal entry.
    ///
    /// Rejects any nonzero residual with [`LedgerError::UnbalancedEntry`];
    /// the check is exact decimal equality, never an epsilon. Replaying the
    /// same idempotency key returns the originally committed entry without
    /// posting again or re-emitting its event.
    pub fn create_entry(
        &self,
        input: NewEntry,
        idempotency_key: IdempotencyKey,
    ) -> Result<JournalEntry, LedgerError> {
        validate_postings(&input.postings)?;

        let now = Utc::now();
        let entry = JournalEntry {
            id: EntryId::new(),
            org_id: self.org_id,
            period: AccountingPeriod::from_date(input.effective_date),
            entry_date: now,
            effective_date: input.effective_date,
            description: input.description,
            source_type: input.source_type,
            source_id: input.source_id,
            idempotency_key,
            trace_id: input.trace_id,
            reverses_id: None,
            reversed_by_id: None,
            created_at: now,
            created_by: input.created_by,
            postings: input.postings,
        };

        let requested_id = entry.id;
        let committed = self.store.commit(entry, None)?;

        if committed.id != requested_id {
            debug!(
                entry = %committed.id,
                key = %committed.idempotency_key,
                "journal entry replayed by idempotency key"
            );
            return Ok(committed);
        }

        self.events.record(NewEvent::from_typed(
            self.org_id,
            committed.trace_id,
            ENTRY_AGGREGATE,
            *committed.id.as_uuid(),
            ENTRY_POSTED,
            committed.entry_date,
            &EntryPosted {
                entry_id: committed.id,
                source_type: committed.source_type,
                description: committed.description.clone(),
                reverses_id: None,
            },
        )?)?;

        info!(
            entry = %committed.id,
            source = ?committed.source_type,
            period = %committed.period,
            "journal entry posted"
        );

        Ok(committed)
    }

    /// Reverse a posted entry.
    ///
    /// The reversal is a new entry dated at reversal time with every
    /// posting amount negated, linked to the original in both directions.
    /// The original is never modified beyond its one-time `reversed_by_id`
    /// link, set inside the reversal's commit.
    pub fn reverse_entry(
        &self,
        entry_id: EntryId,
        reason: &str,
        idempotency_key: IdempotencyKey,
        trace_id: TraceId,
    ) -> Result<JournalEntry, LedgerError> {
        // Replay must win over the already-reversed check: a retry of the
        // reversal that originally committed gets its entry back, not an
        // AlreadyReversed error.
        if let Some(existing) = self
            .store
            .find_by_idempotency_key(self.org_id, &idempotency_key)?
        {
            debug!(
                entry = %existing.id,
                key = %idempotency_key,
                "reversal replayed by idempotency key"
            );
            return Ok(existing);
        }

        let original = self
            .store
            .entry(self.org_id, entry_id)?
            .ok_or(LedgerError::EntryNotFound { entry_id })?;

        if let Some(reversed_by) = original.reversed_by_id {
            return Err(LedgerError::AlreadyReversed {
                entry_id,
                reversed_by,
            });
        }

        let now = Utc::now();
        let reversal = JournalEntry {
            id: EntryId::new(),
            org_id: self.org_id,
            period: AccountingPeriod::from_date(now.date_naive()),
            entry_date: now,
            // Dated at reversal time, not the original entry date.
            effective_date: now.date_naive(),
            description: reason.to_string(),
            source_type: SourceType::Reversal,
            source_id: Some(*original.id.as_uuid()),
            idempotency_key,
            trace_id,
            reverses_id: Some(original.id),
            reversed_by_id: None,
            created_at: now,
            created_by: None,
            postings: original
                .postings
                .iter()
                .map(|p| JournalPosting {
                    account: p.account.clone(),
                    amount: -p.amount,
                    dimensions: p.dimensions,
                    memo: p.memo.clone(),
                })
                .collect(),
        };

        let requested_id = reversal.id;
        let committed = self.store.commit(
            reversal,
            Some(ReversalLink {
                original: original.id,
                reversed_by: requested_id,
            }),
        )?;

        if committed.id != requested_id {
            debug!(
                entry = %committed.id,
                key = %committed.idempotency_key,
                "reversal replayed by idempotency key"
            );
            return Ok(committed);
        }

        self.events.record_batch(vec![
            NewEvent::from_typed(
                self.org_id,
                trace_id,
                ENTRY_AGGREGATE,
                *committed.id.as_uuid(),
                ENTRY_POSTED,
                committed.entry_date,
                &EntryPosted {
                    entry_id: committed.id,
                    source_type: committed.source_type,
                    description: committed.description.clone(),
                    reverses_id: Some(original.id),
                },
            )?,
            NewEvent::from_typed(
                self.org_id,
                trace_id,
                ENTRY_AGGREGATE,
                *original.id.as_uuid(),
                ENTRY_REVERSED,
                committed.entry_date,
                &EntryReversed {
                    entry_id: original.id,
                    reversed_by_id: committed.id,
                    reason: reason.to_string(),
                },
            )?,
        ])?;

        info!(
            entry = %original.id,
            reversal = %committed.id,
            "journal entry reversed"
        );

        Ok(committed)
    }

    /// Current balance of one account; zero for an account with no
    /// activity. O(1) read from the projection.
    pub fn balance(&self, account_code: &str) -> Result<Money, LedgerError> {
        Ok(self
            .store
            .account_balance(self.org_id, account_code)?
            .map(|row| row.balance)
            .unwrap_or(Money::ZERO))
    }

    /// Exact sum of the dimensional balance rows matching one scope,
    /// optionally restricted to one account. Zero for no rows.
    pub fn dimensional_balance(
        &self,
        scope: BalanceScope,
        account_code: Option<&str>,
    ) -> Result<Money, LedgerError> {
        let rows = self.store.dimensional_balances(self.org_id, scope)?;

        Ok(rows
            .into_iter()
            .filter(|row| account_code.is_none_or(|code| row.account_code == code))
            .map(|row| row.balance)
            .sum())
    }

    /// Point read of one entry with its postings.
    pub fn entry(&self, entry_id: EntryId) -> Result<JournalEntry, LedgerError> {
        self.store
            .entry(self.org_id, entry_id)?
            .ok_or(LedgerError::EntryNotFound { entry_id })
    }
}

fn validate_postings(postings: &[JournalPosting]) -> Result<(), LedgerError> {
    if postings.is_empty() {
        return Err(LedgerError::EmptyEntry);
    }

    for (index, posting) in postings.iter().enumerate() {
        if posting.amount.is_zero() {
            return Err(LedgerError::ZeroAmountPosting { index });
        }
    }

    let residual: Money = postings.iter().map(|p| p.amount).sum();
    if !residual.is_zero() {
        return Err(LedgerError::UnbalancedEntry { residual });
    }

    Ok(())
}
