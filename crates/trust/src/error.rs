use thiserror::Error;

use propledger_core::Money;
use propledger_ledger::LedgerError;

use crate::balance::TrustScope;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("distribution amount must be positive (requested {requested})")]
    NonPositiveAmount { requested: Money },

    #[error("scope has negative settled cash ({cash_settled}); no distribution permitted")]
    NegativeScopeBalance { cash_settled: Money },

    #[error("requested {requested} exceeds distributable {distributable}")]
    InsufficientDistributable {
        requested: Money,
        distributable: Money,
    },

    #[error("cross-scope transfer from {source} to {target} would commingle trust funds")]
    Commingle {
        // `r#` keeps thiserror from treating the field as the error's
        // source(); the field name is still `source` to all callers.
        r#source: TrustScope,
        target: TrustScope,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
