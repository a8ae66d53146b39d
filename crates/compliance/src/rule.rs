use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use propledger_core::Money;

/// Jurisdiction code, normalized to uppercase (e.g. "NC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jurisdiction(String);

impl Jurisdiction {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jurisdiction {
    fn from(code: &str) -> Self {
        Jurisdiction::new(code)
    }
}

/// Value a rule resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleValue {
    Amount(Money),
    Integer(i64),
    Flag(bool),
    Text(String),
}

impl RuleValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RuleValue::Amount(_) => "amount",
            RuleValue::Integer(_) => "integer",
            RuleValue::Flag(_) => "flag",
            RuleValue::Text(_) => "text",
        }
    }
}

/// One effective-dated rule row, externally curated and read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub jurisdiction: Jurisdiction,
    pub rule_type: String, // e.g. "fees"
    pub rule_key: String,  // e.g. "nsf_fee_max"
    pub value: RuleValue,
    pub effective_date: NaiveDate,
}

impl ComplianceRule {
    pub fn new(
        jurisdiction: impl Into<Jurisdiction>,
        rule_type: impl Into<String>,
        rule_key: impl Into<String>,
        value: RuleValue,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            rule_type: rule_type.into(),
            rule_key: rule_key.into(),
            value,
            effective_date,
        }
    }
}
