use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use propledger_core::{EntryId, IdempotencyKey, Money, OrgId};

use crate::balance::{AccountBalance, BalanceScope, DimensionalBalance};
use crate::entry::JournalEntry;
use crate::error::LedgerError;

/// The one permitted mutation in the ledger: setting `reversed_by_id` on
/// the original entry when its reversal commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversalLink {
    pub original: EntryId,
    pub reversed_by: EntryId,
}

/// Persistence surface for the ledger.
///
/// `commit` is the atomic unit: header + postings insert, balance and
/// dimensional projection upserts, and the optional reversed-by link all
/// become visible together or not at all. It is also the linearization
/// point for idempotency: committing an entry whose key already exists
/// returns the stored entry untouched instead of inserting a duplicate.
pub trait LedgerStore: Send + Sync {
    fn commit(
        &self,
        entry: JournalEntry,
        link: Option<ReversalLink>,
    ) -> Result<JournalEntry, LedgerError>;

    fn entry(&self, org_id: OrgId, entry_id: EntryId) -> Result<Option<JournalEntry>, LedgerError>;

    fn find_by_idempotency_key(
        &self,
        org_id: OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<JournalEntry>, LedgerError>;

    fn account_balance(
        &self,
        org_id: OrgId,
        account_code: &str,
    ) -> Result<Option<AccountBalance>, LedgerError>;

    /// All dimensional rows for one scope, any account.
    fn dimensional_balances(
        &self,
        org_id: OrgId,
        scope: BalanceScope,
    ) -> Result<Vec<DimensionalBalance>, LedgerError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn commit(
        &self,
        entry: JournalEntry,
        link: Option<ReversalLink>,
    ) -> Result<JournalEntry, LedgerError> {
        (**self).commit(entry, link)
    }

    fn entry(&self, org_id: OrgId, entry_id: EntryId) -> Result<Option<JournalEntry>, LedgerError> {
        (**self).entry(org_id, entry_id)
    }

    fn find_by_idempotency_key(
        &self,
        org_id: OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        (**self).find_by_idempotency_key(org_id, key)
    }

    fn account_balance(
        &self,
        org_id: OrgId,
        account_code: &str,
    ) -> Result<Option<AccountBalance>, LedgerError> {
        (**self).account_balance(org_id, account_code)
    }

    fn dimensional_balances(
        &self,
        org_id: OrgId,
        scope: BalanceScope,
    ) -> Result<Vec<DimensionalBalance>, LedgerError> {
        (**self).dimensional_balances(org_id, scope)
    }
}

#[derive(Debug, Default)]
struct OrgBook {
    entries: HashMap<EntryId, JournalEntry>,
    idempotency: HashMap<String, EntryId>,
    account_balances: HashMap<String, AccountBalance>,
    dimensional_balances: HashMap<(String, BalanceScope), Money>,
}

/// In-memory ledger store.
///
/// One book per organization; the write lock over the whole map is the
/// atomic unit. Intended for tests/dev, not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    books: RwLock<HashMap<OrgId, OrgBook>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn commit(
        &self,
        entry: JournalEntry,
        link: Option<ReversalLink>,
    ) -> Result<JournalEntry, LedgerError> {
        let mut books = self
            .books
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        let book = books.entry(entry.org_id).or_default();

        // Idempotent replay: the key is the linearization point, so a
        // concurrent duplicate resolves to the first committed entry.
        if let Some(existing_id) = book.idempotency.get(entry.idempotency_key.as_str()) {
            let existing = book
                .entries
                .get(existing_id)
                .cloned()
                .ok_or_else(|| LedgerError::Storage("idempotency index out of sync".to_string()))?;
            return Ok(existing);
        }

        // Nothing unbalanced ever reaches the books.
        let residual = entry.posting_total();
        if !residual.is_zero() {
            return Err(LedgerError::UnbalancedEntry { residual });
        }

        // Validate the reversal link before touching any state so a failed
        // commit leaves no partial entry visible.
        if let Some(link) = link {
            if link.reversed_by != entry.id {
                return Err(LedgerError::Storage(
                    "reversal link must reference the committing entry".to_string(),
                ));
            }
            let original = book
                .entries
                .get(&link.original)
                .ok_or(LedgerError::EntryNotFound {
                    entry_id: link.original,
                })?;
            if let Some(reversed_by) = original.reversed_by_id {
                return Err(LedgerError::AlreadyReversed {
                    entry_id: link.original,
                    reversed_by,
                });
            }
        }

        for posting in &entry.postings {
            let row = book
                .account_balances
                .entry(posting.account.code.clone())
                .or_insert_with(|| AccountBalance {
                    account_code: posting.account.code.clone(),
                    account_name: posting.account.name.clone(),
                    kind: posting.account.kind,
                    balance: Money::ZERO,
                });
            row.balance += posting.amount;

            for scope in BalanceScope::from_dimensions(&posting.dimensions) {
                let balance = book
                    .dimensional_balances
                    .entry((posting.account.code.clone(), scope))
                    .or_insert(Money::ZERO);
                *balance += posting.amount;
            }
        }

        if let Some(link) = link {
            if let Some(original) = book.entries.get_mut(&link.original) {
                original.reversed_by_id = Some(link.reversed_by);
            }
        }

        book.idempotency
            .insert(entry.idempotency_key.as_str().to_string(), entry.id);
        book.entries.insert(entry.id, entry.clone());

        Ok(entry)
    }

    fn entry(&self, org_id: OrgId, entry_id: EntryId) -> Result<Option<JournalEntry>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        Ok(books
            .get(&org_id)
            .and_then(|book| book.entries.get(&entry_id))
            .cloned())
    }

    fn find_by_idempotency_key(
        &self,
        org_id: OrgId,
        key: &IdempotencyKey,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        Ok(books.get(&org_id).and_then(|book| {
            book.idempotency
                .get(key.as_str())
                .and_then(|id| book.entries.get(id))
                .cloned()
        }))
    }

    fn account_balance(
        &self,
        org_id: OrgId,
        account_code: &str,
    ) -> Result<Option<AccountBalance>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        Ok(books
            .get(&org_id)
            .and_then(|book| book.account_balances.get(account_code))
            .cloned())
    }

    fn dimensional_balances(
        &self,
        org_id: OrgId,
        scope: BalanceScope,
    ) -> Result<Vec<DimensionalBalance>, LedgerError> {
        let books = self
            .books
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        let Some(book) = books.get(&org_id) else {
            return Ok(Vec::new());
        };

        Ok(book
            .dimensional_balances
            .iter()
            .filter(|((_, row_scope), _)| *row_scope == scope)
            .map(|((code, row_scope), balance)| DimensionalBalance {
                account_code: code.clone(),
                scope: *row_scope,
                balance: *balance,
            })
            .collect())
    }
}
