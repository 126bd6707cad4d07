//! Filter rules for the AMA CPT code system.

use super::provider::CodeSystemRuleProvider;
use super::rules::{CodeValidationRule, FilterRule, OperationSet, PropertyFilterType, PropertyRule};

pub const CPT_SYSTEM: &str = "http://www.ama-assn.org/go/cpt";

/// CPT adds modifier and telehealth flags, and does not allow filtering on
/// `code` at all.
#[derive(Debug, Default, Clone)]
pub struct CptRuleProvider;

impl CptRuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CodeSystemRuleProvider for CptRuleProvider {
    fn system(&self) -> Option<&str> {
        Some(CPT_SYSTEM)
    }

    fn own_property_names(&self) -> &[&'static str] {
        // "code" is listed again on purpose; the base entry keeps its position.
        &[
            "modifier",
            "kind",
            "modified",
            "code",
            "telemedicine",
            "orthopox",
        ]
    }

    fn own_rule(&self, property: &str, requested: OperationSet) -> Option<FilterRule> {
        let rule = match property {
            "modifier" | "modified" | "telemedicine" | "orthopox" => {
                PropertyRule::passthrough(PropertyFilterType::Boolean, None, requested)
            }
            "kind" => PropertyRule::passthrough(
                PropertyFilterType::Code,
                Some(CodeValidationRule::None),
                requested,
            ),
            "code" => return Some(FilterRule::Unsupported),
            _ => return None,
        };
        Some(FilterRule::Found(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::provider::{BASE_PROPERTY_NAMES, BaseRuleProvider};
    use crate::terminology::rules::PropertyOperation;

    #[test]
    fn test_code_is_unsupported_for_cpt_only() {
        let requested = OperationSet::of(&[PropertyOperation::Equals]);

        assert_eq!(
            CptRuleProvider.rules_for_filter("code", requested),
            FilterRule::Unsupported
        );
        assert!(BaseRuleProvider.rules_for_filter("code", requested).is_supported());
    }

    #[test]
    fn test_inherits_base_rules() {
        let requested = OperationSet::of(&[PropertyOperation::Equals]);

        assert_eq!(
            CptRuleProvider.rules_for_filter("inactive", requested),
            BaseRuleProvider.rules_for_filter("inactive", requested)
        );
        assert_eq!(
            CptRuleProvider.rules_for_filter("comment", requested),
            FilterRule::Unsupported
        );
        assert_eq!(
            CptRuleProvider.rules_for_filter("unknown", requested),
            FilterRule::Unsupported
        );
    }

    #[test]
    fn test_property_names_have_no_duplicates() {
        let names = CptRuleProvider.list_property_names();

        for base in BASE_PROPERTY_NAMES {
            assert_eq!(names.iter().filter(|n| n == base).count(), 1, "{base}");
        }
        assert_eq!(names.len(), BASE_PROPERTY_NAMES.len() + 5);
        assert_eq!(
            names[BASE_PROPERTY_NAMES.len()..].to_vec(),
            vec!["modifier", "kind", "modified", "telemedicine", "orthopox"]
        );
        assert_eq!(names, CptRuleProvider.list_property_names());
    }

    #[test]
    fn test_modifier_is_boolean() {
        let rule = CptRuleProvider.rules_for_filter("modifier", OperationSet::all());
        assert_eq!(rule.rule().unwrap().value_kind, PropertyFilterType::Boolean);
    }
}
