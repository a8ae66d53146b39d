//! Jurisdiction-scoped rule lookup ("law as data").
//!
//! Late-fee caps, grace periods, and deposit limits live in an externally
//! curated rule table and are resolved by (jurisdiction, rule type, rule
//! key) as of a date. Business code never hardcodes a jurisdiction
//! threshold; it asks the resolver.

pub mod error;
pub mod resolver;
pub mod rule;
pub mod source;

pub use error::ComplianceError;
pub use resolver::ComplianceResolver;
pub use rule::{ComplianceRule, Jurisdiction, RuleValue};
pub use source::{InMemoryRuleSet, RuleSource};
