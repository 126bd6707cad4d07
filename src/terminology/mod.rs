//! Code system filter rules.
//!
//! This module decides which value set filters are legal against a code
//! system:
//! - [`rules`] - property rule values ([`PropertyRule`], [`FilterRule`])
//! - [`provider`] - the [`CodeSystemRuleProvider`] trait and the base rule table
//! - [`cpt`] - rules specific to CPT
//! - [`registry`] - lookup of providers by code system URL
//! - [`display`] - consistency hint for concept displays
//! - [`filter`] - checking a concrete filter against a provider
//!
//! # Example
//!
//! ```
//! use octofhir_validation_policy::terminology::{
//!     CodeSystemRuleRegistry, FilterRule, OperationSet, PropertyOperation,
//! };
//!
//! let registry = CodeSystemRuleRegistry::with_defaults();
//! let provider = registry.resolve("http://www.ama-assn.org/go/cpt");
//! let requested = OperationSet::of(&[PropertyOperation::Equals]);
//!
//! assert_eq!(provider.rules_for_filter("code", requested), FilterRule::Unsupported);
//! assert!(provider.rules_for_filter("modifier", requested).is_supported());
//! ```

pub mod cpt;
pub mod display;
pub mod filter;
pub mod provider;
pub mod registry;
pub mod rules;

pub use cpt::{CPT_SYSTEM, CptRuleProvider};
pub use display::{CONCEPT_DISPLAY_PRESENCE_MIXED, ConceptDisplayTracker};
pub use filter::{FilterCheckOutcome, ValueSetFilter, check_filter};
pub use provider::{BASE_PROPERTY_NAMES, BaseRuleProvider, CodeSystemRuleProvider, base_rule};
pub use registry::CodeSystemRuleRegistry;
pub use rules::{
    CodeValidationRule, FilterRule, OperationSet, PropertyFilterType, PropertyOperation,
    PropertyRule, describe_operations,
};
