use std::sync::{Arc, RwLock};

use crate::error::ComplianceError;
use crate::rule::{ComplianceRule, Jurisdiction};

/// Read-only lookup over the curated rule table.
pub trait RuleSource: Send + Sync {
    /// All rows matching (jurisdiction, type, key), any effective date, in
    /// insertion order.
    fn rules(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
    ) -> Result<Vec<ComplianceRule>, ComplianceError>;
}

impl<S> RuleSource for Arc<S>
where
    S: RuleSource + ?Sized,
{
    fn rules(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
    ) -> Result<Vec<ComplianceRule>, ComplianceError> {
        (**self).rules(jurisdiction, rule_type, rule_key)
    }
}

/// In-memory rule table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRuleSet {
    rules: RwLock<Vec<ComplianceRule>>,
}

impl InMemoryRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = ComplianceRule>) -> Self {
        Self {
            rules: RwLock::new(rules.into_iter().collect()),
        }
    }

    pub fn insert(&self, rule: ComplianceRule) -> Result<(), ComplianceError> {
        let mut rules = self
            .rules
            .write()
            .map_err(|_| ComplianceError::Source("lock poisoned".to_string()))?;
        rules.push(rule);
        Ok(())
    }
}

impl RuleSource for InMemoryRuleSet {
    fn rules(
        &self,
        jurisdiction: &Jurisdiction,
        rule_type: &str,
        rule_key: &str,
    ) -> Result<Vec<ComplianceRule>, ComplianceError> {
        let rules = self
            .rules
            .read()
            .map_err(|_| ComplianceError::Source("lock poisoned".to_string()))?;

        Ok(rules
            .iter()
            .filter(|r| {
                r.jurisdiction == *jurisdiction
                    && r.rule_type == rule_type
                    && r.rule_key == rule_key
            })
            .cloned()
            .collect())
    }
}
