use std::collections::HashSet;
use std::sync::Arc;

use octofhir_validation_policy::terminology::{
    BASE_PROPERTY_NAMES, BaseRuleProvider, CPT_SYSTEM, CodeValidationRule, CptRuleProvider,
    base_rule,
};
use octofhir_validation_policy::*;

const LOINC: &str = "http://loinc.org";

fn ops(list: &[PropertyOperation]) -> OperationSet {
    OperationSet::of(list)
}

/// Provider for a local code system that adds one property and redefines
/// `status`
#[derive(Debug)]
struct LocalProvider;

impl CodeSystemRuleProvider for LocalProvider {
    fn system(&self) -> Option<&str> {
        Some("http://example.org/fhir/CodeSystem/local")
    }

    fn own_property_names(&self) -> &[&'static str] {
        &["severity", "status", "severity"]
    }

    fn own_rule(&self, property: &str, requested: OperationSet) -> Option<FilterRule> {
        match property {
            "severity" => Some(FilterRule::Found(PropertyRule::restricted(
                PropertyFilterType::Code,
                None,
                requested,
                &[PropertyOperation::Equals, PropertyOperation::In],
            ))),
            "status" => Some(FilterRule::Unsupported),
            _ => None,
        }
    }
}

#[test]
fn test_unknown_names_are_unsupported() {
    let registry = CodeSystemRuleRegistry::with_defaults();
    for system in [LOINC, CPT_SYSTEM] {
        let provider = registry.resolve(system);
        for name in ["", "foo", "Concept", "display"] {
            assert_eq!(
                provider.rules_for_filter(name, OperationSet::all()),
                FilterRule::Unsupported,
                "{name} on {system}"
            );
        }
    }
}

#[test]
fn test_cpt_code_override() {
    let registry = CodeSystemRuleRegistry::with_defaults();
    let requested = ops(&[PropertyOperation::Equals, PropertyOperation::RegEx]);

    assert_eq!(
        registry.resolve(CPT_SYSTEM).rules_for_filter("code", requested),
        FilterRule::Unsupported
    );

    let base = registry.resolve(LOINC).rules_for_filter("code", requested);
    let rule = base.rule().unwrap();
    assert_eq!(rule.value_kind, PropertyFilterType::Code);
    assert_eq!(rule.strictness, Some(CodeValidationRule::Error));
    assert_eq!(rule.legal_operations, requested);
}

#[test]
fn test_cpt_versioned_system_resolves() {
    let registry = CodeSystemRuleRegistry::with_defaults();
    let provider = registry.resolve("http://www.ama-assn.org/go/cpt|2024");
    assert!(
        provider
            .rules_for_filter("telemedicine", OperationSet::all())
            .is_supported()
    );
}

#[test]
fn test_cpt_delegates_other_names_to_base() {
    let cpt = CptRuleProvider::new();
    for name in ["concept", "status", "inactive", "parent", "itemWeight"] {
        assert_eq!(
            cpt.rules_for_filter(name, OperationSet::all()),
            BaseRuleProvider.rules_for_filter(name, OperationSet::all()),
            "{name}"
        );
    }
}

#[test]
fn test_property_names_have_no_duplicates() {
    let providers: Vec<Arc<dyn CodeSystemRuleProvider>> = vec![
        Arc::new(BaseRuleProvider),
        Arc::new(CptRuleProvider::new()),
        Arc::new(LocalProvider),
    ];

    for provider in providers {
        let names = provider.list_property_names();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "{provider:?}");
        assert_eq!(&names[..BASE_PROPERTY_NAMES.len()], BASE_PROPERTY_NAMES);
    }

    let local = LocalProvider.list_property_names();
    assert_eq!(local.len(), BASE_PROPERTY_NAMES.len() + 1);
    assert_eq!(local.last().map(String::as_str), Some("severity"));
}

#[test]
fn test_listed_names_resolve_explicitly() {
    for provider in [
        Arc::new(CptRuleProvider::new()) as Arc<dyn CodeSystemRuleProvider>,
        Arc::new(LocalProvider),
    ] {
        for name in provider.list_property_names() {
            // Found or an explicit Unsupported; never a panic or a silent gap
            let rule = provider.rules_for_filter(&name, OperationSet::all());
            if let FilterRule::Found(rule) = rule {
                assert!(rule.legal_operations.is_subset(&OperationSet::all()));
            }
        }
    }
}

#[test]
fn test_comment_never_has_rule() {
    assert_eq!(
        base_rule("comment", OperationSet::all()),
        Some(FilterRule::Unsupported)
    );
    for provider in [
        Arc::new(BaseRuleProvider) as Arc<dyn CodeSystemRuleProvider>,
        Arc::new(CptRuleProvider::new()),
        Arc::new(LocalProvider),
    ] {
        assert_eq!(
            provider.rules_for_filter("comment", OperationSet::all()),
            FilterRule::Unsupported
        );
    }
}

#[test]
fn test_status_passes_requested_operations() {
    let requested = ops(&[PropertyOperation::Equals, PropertyOperation::DescendentOf]);
    let rule = BaseRuleProvider.rules_for_filter("status", requested);
    assert_eq!(rule.rule().unwrap().legal_operations, requested);
}

#[test]
fn test_concept_strips_regex() {
    let requested = ops(&[PropertyOperation::IsA, PropertyOperation::RegEx]);
    let rule = BaseRuleProvider.rules_for_filter("concept", requested);
    assert_eq!(
        rule.rule().unwrap().legal_operations,
        ops(&[PropertyOperation::IsA])
    );
}

#[test]
fn test_legal_operations_subset_of_requested() {
    let requests = [
        OperationSet::empty(),
        ops(&[PropertyOperation::Equals]),
        ops(&[PropertyOperation::RegEx, PropertyOperation::Exists]),
        ops(&[PropertyOperation::Generalizes, PropertyOperation::ChildOf]),
        OperationSet::all(),
    ];
    let cpt = CptRuleProvider::new();

    for requested in requests {
        for name in cpt.list_property_names() {
            if let FilterRule::Found(rule) = cpt.rules_for_filter(&name, requested) {
                assert!(
                    rule.legal_operations.is_subset(&requested),
                    "{name}: {:?} not within {:?}",
                    rule.legal_operations,
                    requested
                );
            }
        }
    }
}

#[test]
fn test_custom_provider_registration() {
    let registry = CodeSystemRuleRegistry::with_defaults().with_provider(Arc::new(LocalProvider));
    assert!(registry.has_specific_provider("http://example.org/fhir/CodeSystem/local"));
    assert_eq!(registry.len(), 2);

    let provider = registry.resolve("http://example.org/fhir/CodeSystem/local");
    assert_eq!(
        provider.rules_for_filter("status", OperationSet::all()),
        FilterRule::Unsupported
    );
    let severity = provider.rules_for_filter("severity", OperationSet::all());
    assert_eq!(
        severity.rule().unwrap().legal_operations,
        ops(&[PropertyOperation::Equals, PropertyOperation::In])
    );
    // Names the provider does not define still come from the base table
    assert!(
        provider
            .rules_for_filter("inactive", OperationSet::all())
            .is_supported()
    );
}

#[test]
fn test_display_tracker_emits_only_when_mixed() {
    let cases: [(&[bool], bool); 5] = [
        (&[], false),
        (&[true, true], false),
        (&[false, false], false),
        (&[true, false], true),
        (&[false, true, true, false], true),
    ];

    for (observations, expected) in cases {
        let mut tracker = ConceptDisplayTracker::new();
        for has_display in observations {
            tracker.observe(*has_display);
        }
        let hint = tracker.finish("CodeSystem");
        assert_eq!(hint.is_some(), expected, "{observations:?}");
        if let Some(issue) = hint {
            assert_eq!(issue.severity, ValidationSeverity::Information);
        }
    }
}
