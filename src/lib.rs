//! # OctoFHIR Validation Policy
//!
//! Policy layer for a FHIR validator: decides which checks run, and describes
//! which code system properties may be used in value set filters.
//!
//! ## Features
//!
//! - **Policy advisors**: per-reference, per-resource, per-element and
//!   per-coded-value decisions behind the [`ValidationPolicyAdvisor`] trait
//! - **Filter rules**: base rules for every code system plus overrides such
//!   as CPT, resolved through a [`CodeSystemRuleRegistry`]
//! - **Sessions**: [`ValidationSession`] checks advisor answers, scans code
//!   systems and value set filters, and collects issues
//! - **Clinical safety**: vital-signs observations always get their
//!   mandatory profiles unless configuration explicitly opts out
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_validation_policy::*;
//! use serde_json::json;
//!
//! # fn example() -> Result<()> {
//! let engine = PolicyEngine::new(PolicyConfig::default())?;
//! let mut session = engine.session();
//!
//! session.check_code_system(&json!({
//!     "resourceType": "CodeSystem",
//!     "concept": [{ "code": "a", "display": "A" }, { "code": "b" }]
//! }))?;
//!
//! let result = session.into_result();
//! assert_eq!(result.info_count, 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod core;
pub mod error;
pub mod policy;
pub mod terminology;
pub mod types;
pub mod validation;

pub use self::core::{PolicyConfig, PolicyEngine, SessionConfig, SuppressionRules};
pub use error::Result; // Our Result type takes precedence
pub use error::{PolicyError, PolicyErrorCode};
pub use policy::{
    BasePolicyAdvisor, CodedContentCheckSet, CodedContentValidationAction,
    ContainedReferenceValidationPolicy, ElementCheckSet, ElementValidationAction, PolicyContext,
    ReferenceValidationPolicy, ResourceCheckSet, ResourceValidationAction,
    RulesDrivenPolicyAdvisor, ValidationPolicyAdvisor,
};
pub use terminology::{
    CodeSystemRuleProvider, CodeSystemRuleRegistry, ConceptDisplayTracker, FilterRule,
    OperationSet, PropertyFilterType, PropertyOperation, PropertyRule,
};
pub use types::{Flag, FlagSet};
pub use validation::{
    CodedContentDecision, MessageSink, ValidationIssue, ValidationResult, ValidationSeverity,
    ValidationSession,
};
