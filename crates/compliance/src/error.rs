use chrono::NaiveDate;
use thiserror::Error;

use crate::rule::Jurisdiction;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("compliance rule missing: {jurisdiction}/{rule_type}/{rule_key} as of {as_of}")]
    RuleMissing {
        jurisdiction: Jurisdiction,
        rule_type: String,
        rule_key: String,
        as_of: NaiveDate,
    },

    #[error("compliance rule {rule_key} holds a {found} value, expected {expected}")]
    WrongKind {
        rule_key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("compliance source failed: {0}")]
    Source(String),
}
