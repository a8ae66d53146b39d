use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use propledger_core::Money;

use crate::error::ComplianceError;
use crate::rule::{Jurisdiction, RuleValue};
use crate::source::RuleSource;

/// Resolves jurisdiction rules with effective dating.
///
/// Among rows whose effective date is on or before the query date, the most
/// recent wins; ties resolve to the last written row.
pub struct ComplianceResolver {
    source: Arc<dyn RuleSource>,
}

impl ComplianceResolver {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self { source }
    }

    pub fn value(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
        as_of: NaiveDate,
    ) -> Result<RuleValue, ComplianceError> {
        let mut candidates: Vec<_> = self
            .source
            .rules(jurisdiction, rule_type, rule_key)?
            .into_iter()
            .filter(|r| r.effective_date <= as_of)
            .collect();

        // Stable sort keeps insertion order among equal dates, so popping
        // the tail is last-writer-wins.
        candidates.sort_by_key(|r| r.effective_date);

        let resolved = candidates
            .pop()
            .ok_or_else(|| ComplianceError::RuleMissing {
                jurisdiction: jurisdiction.clone(),
                rule_type: rule_type.to_string(),
                rule_key: rule_key.to_string(),
                as_of,
            })?;

        debug!(
            jurisdiction = %jurisdiction,
            rule_type,
            rule_key,
            effective = %resolved.effective_date,
            "compliance rule resolved"
        );

        Ok(resolved.value)
    }

    /// Resolve a rule that must hold a monetary amount.
    pub fn amount(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
        as_of: NaiveDate,
    ) -> Result<Money, ComplianceError> {
        match self.value(jurisdiction, rule_type, rule_key, as_of)? {
            RuleValue::Amount(amount) => Ok(amount),
            other => Err(ComplianceError::WrongKind {
                rule_key: rule_key.to_string(),
                expected: "amount",
                found: other.kind_name(),
            }),
        }
    }

    /// Resolve a rule that must hold an integer (e.g. a grace period in days).
    pub fn integer(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
        as_of: NaiveDate,
    ) -> Result<i64, ComplianceError> {
        match self.value(jurisdiction, rule_type, rule_key, as_of)? {
            RuleValue::Integer(n) => Ok(n),
            other => Err(ComplianceError::WrongKind {
                rule_key: rule_key.to_string(),
                expected: "integer",
                found: other.kind_name(),
            }),
        }
    }

    /// Resolve a rule that must hold a boolean flag.
    pub fn flag(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
        as_of: NaiveDate,
    ) -> Result<bool, ComplianceError> {
        match self.value(jurisdiction, rule_type, rule_key, as_of)? {
            RuleValue::Flag(flag) => Ok(flag),
            other => Err(ComplianceError::WrongKind {
                rule_key: rule_key.to_string(),
                expected: "flag",
                found: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::rule::ComplianceRule;
    use crate::source::InMemoryRuleSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn resolver(rules: Vec<ComplianceRule>) -> ComplianceResolver {
        ComplianceResolver::new(Arc::new(InMemoryRuleSet::with_rules(rules)))
    }

    #[test]
    fn picks_most_recent_effective_rule_on_or_before_query_date() {
        let nc = Jurisdiction::new("NC");
        let resolver = resolver(vec![
            ComplianceRule::new(
                "NC",
                "fees",
                "nsf_fee_max",
                RuleValue::Amount(money("10.00")),
                date(2020, 1, 1),
            ),
            ComplianceRule::new(
                "NC",
                "fees",
                "nsf_fee_max",
                RuleValue::Amount(money("15.00")),
                date(2024, 7, 1),
            ),
            ComplianceRule::new(
                "NC",
                "fees",
                "nsf_fee_max",
                RuleValue::Amount(money("25.00")),
                date(2027, 1, 1),
            ),
        ]);

        let cap = resolver
            .amount(&nc, "fees", "nsf_fee_max", date(2026, 3, 1))
            .unwrap();
        assert_eq!(cap, money("15.00"));

        // Before the first effective date nothing applies.
        let err = resolver
            .amount(&nc, "fees", "nsf_fee_max", date(2019, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ComplianceError::RuleMissing { .. }));
    }

    #[test]
    fn equal_effective_dates_resolve_to_the_last_written_row() {
        let nc = Jurisdiction::new("NC");
        let resolver = resolver(vec![
            ComplianceRule::new(
                "NC",
                "fees",
                "late_fee_max",
                RuleValue::Amount(money("40.00")),
                date(2024, 1, 1),
            ),
            ComplianceRule::new(
                "NC",
                "fees",
                "late_fee_max",
                RuleValue::Amount(money("45.00")),
                date(2024, 1, 1),
            ),
        ]);

        let cap = resolver
            .amount(&nc, "fees", "late_fee_max", date(2026, 1, 1))
            .unwrap();
        assert_eq!(cap, money("45.00"));
    }

    #[test]
    fn jurisdiction_codes_are_case_insensitive() {
        let resolver = resolver(vec![ComplianceRule::new(
            "nc",
            "deposits",
            "security_deposit_max_months",
            RuleValue::Integer(2),
            date(2020, 1, 1),
        )]);

        let months = resolver
            .integer(
                &Jurisdiction::new("NC"),
                "deposits",
                "security_deposit_max_months",
                date(2026, 1, 1),
            )
            .unwrap();
        assert_eq!(months, 2);
    }

    #[test]
    fn wrong_kind_is_reported_not_coerced() {
        let nc = Jurisdiction::new("NC");
        let resolver = resolver(vec![ComplianceRule::new(
            "NC",
            "fees",
            "late_fee_allowed",
            RuleValue::Flag(true),
            date(2020, 1, 1),
        )]);

        let err = resolver
            .amount(&nc, "fees", "late_fee_allowed", date(2026, 1, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            ComplianceError::WrongKind {
                expected: "amount",
                found: "flag",
                ..
            }
        ));

        assert!(
            resolver
                .flag(&nc, "fees", "late_fee_allowed", date(2026, 1, 1))
                .unwrap()
        );
    }
}
