//! Code system rule providers.
//!
//! A provider answers two questions for one code system: which property names
//! a value set filter may mention, and what a filter on a given property may do.
//! Every provider inherits the system-agnostic table in [`base_rule`]; a
//! system-specific provider only describes what it adds or redefines.

use std::fmt::Debug;

use super::rules::{
    CodeValidationRule, FilterRule, OperationSet, PropertyFilterType, PropertyOperation,
    PropertyRule,
};

/// Property names that are defined for every code system
pub const BASE_PROPERTY_NAMES: &[&str] = &[
    "concept",
    "code",
    "status",
    "inactive",
    "effectiveDate",
    "deprecationDate",
    "retirementDate",
    "notSelectable",
    "parent",
    "child",
    "partOf",
    "synonym",
    "comment",
    "itemWeight",
];

const CONCEPT_OPERATIONS: &[PropertyOperation] = &[
    PropertyOperation::Equals,
    PropertyOperation::In,
    PropertyOperation::IsA,
    PropertyOperation::DescendentOf,
    PropertyOperation::DescendentLeaf,
    PropertyOperation::IsNotA,
    PropertyOperation::NotIn,
];

const CODE_OPERATIONS: &[PropertyOperation] = &[PropertyOperation::Equals, PropertyOperation::RegEx];

/// Rule table shared by all code systems.
///
/// Returns `None` for names the table does not know, and
/// `Some(FilterRule::Unsupported)` for names it knows but refuses to filter on.
pub fn base_rule(property: &str, requested: OperationSet) -> Option<FilterRule> {
    use PropertyFilterType::{Boolean, Code, DateTime, Decimal};

    let error = Some(CodeValidationRule::Error);
    let none = Some(CodeValidationRule::None);

    let rule = match property {
        "concept" => PropertyRule::restricted(Code, error, requested, CONCEPT_OPERATIONS),
        "code" => PropertyRule::restricted(Code, error, requested, CODE_OPERATIONS),
        "status" => PropertyRule::passthrough(Code, none, requested),
        "inactive" | "notSelectable" => PropertyRule::passthrough(Boolean, None, requested),
        "effectiveDate" | "deprecationDate" | "retirementDate" => {
            PropertyRule::passthrough(DateTime, None, requested)
        }
        "parent" | "child" | "partOf" => PropertyRule::passthrough(Code, error, requested),
        "synonym" => PropertyRule::passthrough(Code, none, requested),
        "itemWeight" => PropertyRule::passthrough(Decimal, None, requested),
        "comment" => return Some(FilterRule::Unsupported),
        _ => return None,
    };
    Some(FilterRule::Found(rule))
}

/// Filter legality for one code system.
///
/// Implementors override [`own_property_names`](Self::own_property_names) and
/// [`own_rule`](Self::own_rule); the provided methods merge those with the
/// base table so that unknown names always fall through to it.
pub trait CodeSystemRuleProvider: Send + Sync + Debug {
    /// Canonical URL of the code system this provider serves, if any
    fn system(&self) -> Option<&str> {
        None
    }

    /// Property names this provider adds to the base names
    fn own_property_names(&self) -> &[&'static str] {
        &[]
    }

    /// Rule for a property this provider defines or redefines.
    ///
    /// `None` means "not mine" and defers to the base table.
    fn own_rule(&self, property: &str, requested: OperationSet) -> Option<FilterRule> {
        let _ = (property, requested);
        None
    }

    /// Ordered property names, base names first, duplicates suppressed
    fn list_property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BASE_PROPERTY_NAMES.iter().map(|n| n.to_string()).collect();
        for name in self.own_property_names() {
            add_name(&mut names, name);
        }
        names
    }

    /// Look up the rule for filtering on `property` with `requested` operators
    fn rules_for_filter(&self, property: &str, requested: OperationSet) -> FilterRule {
        self.own_rule(property, requested)
            .or_else(|| base_rule(property, requested))
            .unwrap_or(FilterRule::Unsupported)
    }
}

/// Append `name` unless it is already listed
pub fn add_name(names: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Provider used for code systems without specific rules
#[derive(Debug, Default, Clone)]
pub struct BaseRuleProvider;

impl BaseRuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CodeSystemRuleProvider for BaseRuleProvider {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(list: &[PropertyOperation]) -> OperationSet {
        OperationSet::of(list)
    }

    #[test]
    fn test_base_names_resolve() {
        let provider = BaseRuleProvider::new();
        let requested = OperationSet::all();

        for name in provider.list_property_names() {
            let rule = provider.rules_for_filter(&name, requested);
            if name == "comment" {
                assert_eq!(rule, FilterRule::Unsupported);
            } else {
                assert!(rule.is_supported(), "{name} should have a rule");
            }
        }
    }

    #[test]
    fn test_code_rule() {
        let rule = BaseRuleProvider
            .rules_for_filter(
                "code",
                ops(&[PropertyOperation::Equals, PropertyOperation::RegEx]),
            )
            .rule()
            .copied()
            .unwrap();

        assert_eq!(rule.value_kind, PropertyFilterType::Code);
        assert_eq!(rule.strictness, Some(CodeValidationRule::Error));
        assert_eq!(
            rule.legal_operations,
            ops(&[PropertyOperation::Equals, PropertyOperation::RegEx])
        );
    }

    #[test]
    fn test_status_passes_request_through() {
        let requested = ops(&[PropertyOperation::Equals, PropertyOperation::DescendentOf]);
        let rule = BaseRuleProvider.rules_for_filter("status", requested);

        assert_eq!(rule.rule().unwrap().legal_operations, requested);
        assert_eq!(rule.rule().unwrap().strictness, Some(CodeValidationRule::None));
    }

    #[test]
    fn test_concept_excludes_regex() {
        let rule = BaseRuleProvider.rules_for_filter("concept", ops(&[PropertyOperation::RegEx]));
        let rule = rule.rule().unwrap();

        assert!(!rule.allows(PropertyOperation::RegEx));
        assert!(rule.legal_operations.is_empty());
    }

    #[test]
    fn test_unknown_property_is_unsupported() {
        assert_eq!(
            BaseRuleProvider.rules_for_filter("modifier", OperationSet::all()),
            FilterRule::Unsupported
        );
        assert_eq!(base_rule("modifier", OperationSet::all()), None);
        assert_eq!(
            base_rule("comment", OperationSet::all()),
            Some(FilterRule::Unsupported)
        );
    }

    #[test]
    fn test_add_name_is_idempotent() {
        let mut names = vec!["code".to_string()];
        add_name(&mut names, "code");
        add_name(&mut names, "kind");
        add_name(&mut names, "kind");
        add_name(&mut names, "");
        assert_eq!(names, vec!["code", "kind"]);
    }
}
