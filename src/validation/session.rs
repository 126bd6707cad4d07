//! Per-run validation session.
//!
//! A session asks the shared advisor for decisions, checks the answers it gets
//! back, and collects every finding of one validation run. Sessions are cheap:
//! the advisor and the rule registry are shared behind `Arc`, while the
//! issues and display trackers belong to the session alone.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use super::{MessageSink, ValidationIssue, ValidationResult, ValidationSeverity};
use crate::error::{PolicyError, Result};
use crate::policy::vital_signs::{self, PROFILE_IMPLIED};
use crate::policy::{
    AdditionalBindingPurpose, BindingKind, CodedContentCheckSet, CodedContentValidationAction,
    ContainedReferenceValidationPolicy, ContainmentContext, ElementCheckSet,
    ElementValidationAction, PolicyContext, ReferenceValidationPolicy, ResourceCheckSet,
    ValidationPolicyAdvisor,
};
use crate::terminology::filter::FILTER_VALUE_INVALID;
use crate::terminology::{
    CodeSystemRuleRegistry, ConceptDisplayTracker, FilterCheckOutcome, ValueSetFilter,
    check_filter,
};

pub const ADVISOR_CONTRACT_VIOLATION: &str = "advisor-contract-violation";
pub const VALUE_SET_FILTER_WITHOUT_SYSTEM: &str = "value-set-filter-without-system";

/// The checks to run for one coded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedContentDecision {
    /// Checks the advisor asked for
    pub checks: CodedContentCheckSet,
    /// Set when the advisor's answer was inconsistent. The value is then
    /// failed without running any terminology check.
    pub contract_violated: bool,
}

impl CodedContentDecision {
    /// Whether `action` should be performed for this value
    pub fn runs(&self, action: CodedContentValidationAction) -> bool {
        !self.contract_violated && self.checks.contains(action)
    }

    pub fn is_failed(&self) -> bool {
        self.contract_violated
    }
}

#[derive(Debug, Clone)]
pub struct ValidationSession {
    advisor: Arc<dyn ValidationPolicyAdvisor>,
    registry: Arc<CodeSystemRuleRegistry>,
    infer_clinical_profiles: bool,
    issues: Vec<ValidationIssue>,
}

impl ValidationSession {
    pub fn new(
        advisor: Arc<dyn ValidationPolicyAdvisor>,
        registry: Arc<CodeSystemRuleRegistry>,
    ) -> Self {
        Self {
            advisor,
            registry,
            infer_clinical_profiles: true,
            issues: Vec::new(),
        }
    }

    /// Disable the independent vital-signs check on implied profiles
    pub fn with_clinical_profile_inference(mut self, enabled: bool) -> Self {
        self.infer_clinical_profiles = enabled;
        self
    }

    pub fn advisor(&self) -> &dyn ValidationPolicyAdvisor {
        self.advisor.as_ref()
    }

    pub fn registry(&self) -> &CodeSystemRuleRegistry {
        &self.registry
    }

    pub fn reference_policy(&self, ctx: &PolicyContext<'_>, url: &str) -> ReferenceValidationPolicy {
        self.advisor.policy_for_reference(ctx, url)
    }

    pub fn contained_policy(
        &self,
        ctx: &PolicyContext<'_>,
        containment: &ContainmentContext<'_>,
    ) -> ContainedReferenceValidationPolicy {
        self.advisor.policy_for_contained(ctx, containment)
    }

    pub fn resource_checks(&self, ctx: &PolicyContext<'_>) -> ResourceCheckSet {
        self.advisor.policy_for_resource(ctx)
    }

    pub fn element_checks(&self, ctx: &PolicyContext<'_>) -> ElementCheckSet {
        self.advisor.policy_for_element(ctx)
    }

    /// Element checks while matching slices; cardinality always runs there
    pub fn slice_matching_checks(&self, ctx: &PolicyContext<'_>) -> ElementCheckSet {
        self.advisor
            .policy_for_element(ctx)
            .with(ElementValidationAction::Cardinality)
    }

    /// Ask which terminology checks run for one coded value.
    ///
    /// Blank candidate systems are rejected before the advisor is consulted.
    pub fn coded_content_checks(
        &mut self,
        ctx: &PolicyContext<'_>,
        kind: BindingKind,
        purpose: Option<AdditionalBindingPurpose>,
        value_set: Option<&str>,
        systems: &[String],
    ) -> Result<CodedContentDecision> {
        require_path(ctx)?;
        if let Some(index) = systems.iter().position(|s| s.trim().is_empty()) {
            return Err(PolicyError::invalid_candidate_system(
                index,
                "candidate code system is blank",
            ));
        }

        let checks = self
            .advisor
            .policy_for_coded_content(ctx, kind, purpose, value_set, systems);

        let consistent = !checks.contains(CodedContentValidationAction::VsCheckThisCode)
            || checks.contains(CodedContentValidationAction::VsCheck);
        if !consistent {
            tracing::warn!(
                "Advisor {:?} asked for a per-code value set check without a value set check at {}",
                self.advisor,
                ctx.path
            );
        }
        self.issues.rule(
            ADVISOR_CONTRACT_VIOLATION,
            ctx.path,
            consistent,
            "The validation policy asked for a per-code value set check without a value set check; the coded value is treated as failed",
        );

        Ok(CodedContentDecision {
            checks,
            contract_violated: !consistent,
        })
    }

    /// Profiles to validate `resource` against beyond those it declares.
    ///
    /// Unusable URLs from the advisor are reported and dropped. Unless
    /// clinical profile inference is disabled, mandatory vital-signs profiles
    /// are added even when the advisor leaves them out.
    pub fn implied_profiles(
        &mut self,
        ctx: &PolicyContext<'_>,
        resource: &Value,
        valid: bool,
    ) -> Result<Vec<String>> {
        require_path(ctx)?;
        if resource.get("resourceType").and_then(Value::as_str).is_none() {
            return Err(PolicyError::invalid_resource(format!(
                "resource at {} has no resourceType",
                ctx.path
            )));
        }

        let proposed = self
            .advisor
            .implied_profiles(ctx, resource, valid, &mut self.issues);

        let mut profiles: Vec<String> = Vec::with_capacity(proposed.len());
        for profile in proposed {
            if Url::parse(&profile).is_err() {
                tracing::warn!("Advisor proposed unusable profile {profile:?} at {}", ctx.path);
                self.issues.rule(
                    ADVISOR_CONTRACT_VIOLATION,
                    ctx.path,
                    false,
                    &format!("The validation policy proposed '{profile}', which is not an absolute profile URL"),
                );
                continue;
            }
            if !profiles.contains(&profile) {
                profiles.push(profile);
            }
        }

        let declared = vital_signs::declared_profiles(resource);
        let missing: Vec<_> = vital_signs::required_profiles(resource)
            .into_iter()
            .filter(|m| {
                !declared.contains(&m.profile.as_str())
                    && !profiles.iter().any(|p| unversioned(p) == m.profile)
            })
            .collect();

        if !missing.is_empty() && !self.infer_clinical_profiles {
            tracing::warn!(
                "Vital-signs profile inference is disabled; {} mandatory profile(s) skipped at {}",
                missing.len(),
                ctx.path
            );
            return Ok(profiles);
        }

        for found in missing {
            tracing::debug!("Adding mandatory profile {} at {}", found.profile, ctx.path);
            self.issues.hint(
                PROFILE_IMPLIED,
                ctx.path,
                false,
                &format!(
                    "The observation code {}#{} identifies a vital sign, so the resource is also validated against {}",
                    found.system, found.code, found.profile
                ),
            );
            profiles.push(found.profile);
        }

        Ok(profiles)
    }

    /// Scan the concepts of a CodeSystem resource, nested ones included
    pub fn check_code_system(&mut self, code_system: &Value) -> Result<()> {
        self.check_code_system_at(code_system, None, None)
    }

    /// Like [`check_code_system`](Self::check_code_system), reporting findings
    /// at the source position of the concept list when the host knows it
    pub fn check_code_system_at(
        &mut self,
        code_system: &Value,
        line: Option<u32>,
        column: Option<u32>,
    ) -> Result<()> {
        expect_resource(code_system, "CodeSystem")?;

        let mut tracker = ConceptDisplayTracker::new();
        let mut pending: Vec<&Value> = concepts(code_system).collect();
        let mut seen = 0usize;
        while let Some(concept) = pending.pop() {
            seen += 1;
            tracker.observe_display(concept.get("display").and_then(Value::as_str));
            pending.extend(concepts(concept));
        }

        tracing::debug!("Scanned {seen} concepts");
        tracker.report(&mut self.issues, line, column, "CodeSystem");
        Ok(())
    }

    /// Check every filter in the compose section of a ValueSet resource.
    ///
    /// Returns one outcome per filter, includes first, in document order.
    /// Malformed filter entries are reported and get an invalid outcome.
    pub fn check_value_set(&mut self, value_set: &Value) -> Result<Vec<FilterCheckOutcome>> {
        expect_resource(value_set, "ValueSet")?;

        let mut outcomes = Vec::new();
        let Some(compose) = value_set.get("compose") else {
            return Ok(outcomes);
        };

        for section in ["include", "exclude"] {
            let entries = compose.get(section).and_then(Value::as_array);
            for (i, entry) in entries.into_iter().flatten().enumerate() {
                let base = format!("ValueSet.compose.{section}[{i}]");
                let filters = entry.get("filter").and_then(Value::as_array);
                let Some(filters) = filters.filter(|f| !f.is_empty()) else {
                    continue;
                };

                let Some(system) = entry.get("system").and_then(Value::as_str) else {
                    self.issues.rule(
                        VALUE_SET_FILTER_WITHOUT_SYSTEM,
                        &base,
                        false,
                        "Filters can only be used when a code system is named",
                    );
                    continue;
                };

                let provider = self.registry.resolve(system);
                for (j, raw) in filters.iter().enumerate() {
                    let path = format!("{base}.filter[{j}]");
                    let filter: ValueSetFilter = match serde_json::from_value(raw.clone()) {
                        Ok(filter) => filter,
                        Err(e) => {
                            self.issues.rule(
                                FILTER_VALUE_INVALID,
                                &path,
                                false,
                                &format!("The filter is malformed: {e}"),
                            );
                            outcomes.push(FilterCheckOutcome::default());
                            continue;
                        }
                    };
                    outcomes.push(check_filter(
                        provider.as_ref(),
                        system,
                        &filter,
                        &path,
                        &mut self.issues,
                    ));
                }
            }
        }
        Ok(outcomes)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Error)
    }

    pub fn into_result(self) -> ValidationResult {
        ValidationResult::from_issues(self.issues)
    }
}

impl MessageSink for ValidationSession {
    fn record(
        &mut self,
        severity: ValidationSeverity,
        code: &str,
        line: Option<u32>,
        column: Option<u32>,
        path: &str,
        condition: bool,
        message: &str,
    ) -> bool {
        self.issues
            .record(severity, code, line, column, path, condition, message)
    }
}

fn unversioned(url: &str) -> &str {
    url.split_once('|').map_or(url, |(u, _)| u)
}

fn require_path(ctx: &PolicyContext<'_>) -> Result<()> {
    if ctx.path.trim().is_empty() {
        return Err(PolicyError::invalid_context("decision requested without an instance path"));
    }
    Ok(())
}

fn expect_resource(resource: &Value, resource_type: &str) -> Result<()> {
    match resource.get("resourceType").and_then(Value::as_str) {
        Some(found) if found == resource_type => Ok(()),
        Some(found) => Err(PolicyError::invalid_resource(format!(
            "expected a {resource_type}, found {found}"
        ))),
        None => Err(PolicyError::invalid_resource(format!(
            "expected a {resource_type}, found no resourceType"
        ))),
    }
}

fn concepts(parent: &Value) -> impl Iterator<Item = &Value> {
    parent
        .get("concept")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BasePolicyAdvisor;
    use crate::terminology::{CONCEPT_DISPLAY_PRESENCE_MIXED, CPT_SYSTEM};
    use serde_json::json;

    fn session() -> ValidationSession {
        ValidationSession::new(
            Arc::new(BasePolicyAdvisor::default()),
            Arc::new(CodeSystemRuleRegistry::with_defaults()),
        )
    }

    /// Base decisions, but implied profiles carry a version suffix
    #[derive(Debug)]
    struct Pinned(BasePolicyAdvisor);

    impl ValidationPolicyAdvisor for Pinned {
        fn policy_for_reference(&self, ctx: &PolicyContext<'_>, url: &str) -> ReferenceValidationPolicy {
            self.0.policy_for_reference(ctx, url)
        }

        fn policy_for_contained(
            &self,
            ctx: &PolicyContext<'_>,
            containment: &ContainmentContext<'_>,
        ) -> ContainedReferenceValidationPolicy {
            self.0.policy_for_contained(ctx, containment)
        }

        fn policy_for_resource(&self, ctx: &PolicyContext<'_>) -> ResourceCheckSet {
            self.0.policy_for_resource(ctx)
        }

        fn policy_for_element(&self, ctx: &PolicyContext<'_>) -> ElementCheckSet {
            self.0.policy_for_element(ctx)
        }

        fn policy_for_coded_content(
            &self,
            ctx: &PolicyContext<'_>,
            kind: BindingKind,
            purpose: Option<AdditionalBindingPurpose>,
            value_set: Option<&str>,
            systems: &[String],
        ) -> CodedContentCheckSet {
            self.0
                .policy_for_coded_content(ctx, kind, purpose, value_set, systems)
        }

        fn implied_profiles(
            &self,
            _: &PolicyContext<'_>,
            _: &Value,
            _: bool,
            _: &mut dyn MessageSink,
        ) -> Vec<String> {
            vec!["http://hl7.org/fhir/StructureDefinition/bodytemp|4.0.1".to_string()]
        }
    }

    /// Advisor that breaks its contract in both possible ways
    #[derive(Debug)]
    struct Careless;

    impl ValidationPolicyAdvisor for Careless {
        fn policy_for_reference(&self, _: &PolicyContext<'_>, _: &str) -> ReferenceValidationPolicy {
            ReferenceValidationPolicy::Ignore
        }

        fn policy_for_contained(
            &self,
            _: &PolicyContext<'_>,
            _: &ContainmentContext<'_>,
        ) -> ContainedReferenceValidationPolicy {
            ContainedReferenceValidationPolicy::Ignore
        }

        fn policy_for_resource(&self, _: &PolicyContext<'_>) -> ResourceCheckSet {
            ResourceCheckSet::empty()
        }

        fn policy_for_element(&self, _: &PolicyContext<'_>) -> ElementCheckSet {
            ElementCheckSet::empty()
        }

        fn policy_for_coded_content(
            &self,
            _: &PolicyContext<'_>,
            _: BindingKind,
            _: Option<AdditionalBindingPurpose>,
            _: Option<&str>,
            _: &[String],
        ) -> CodedContentCheckSet {
            CodedContentCheckSet::of(&[CodedContentValidationAction::VsCheckThisCode])
        }

        fn implied_profiles(
            &self,
            _: &PolicyContext<'_>,
            _: &Value,
            _: bool,
            _: &mut dyn MessageSink,
        ) -> Vec<String> {
            vec!["bodytemp".to_string()]
        }
    }

    #[test]
    fn test_slice_matching_keeps_cardinality() {
        let session = ValidationSession::new(
            Arc::new(Careless),
            Arc::new(CodeSystemRuleRegistry::default()),
        );
        let ctx = PolicyContext::new("Observation.component[0]");

        assert!(session.element_checks(&ctx).is_empty());
        assert_eq!(
            session.slice_matching_checks(&ctx),
            ElementCheckSet::of(&[ElementValidationAction::Cardinality])
        );
    }

    #[test]
    fn test_blank_system_rejected() {
        let mut session = session();
        let ctx = PolicyContext::new("Observation.code.coding[1]");
        let systems = vec!["http://loinc.org".to_string(), "  ".to_string()];

        let err = session
            .coded_content_checks(&ctx, BindingKind::Primary, None, None, &systems)
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidCandidateSystem { index: 1, .. }
        ));
        assert!(session.issues().is_empty());
    }

    #[test]
    fn test_blank_path_rejected() {
        let mut session = session();
        let err = session
            .coded_content_checks(&PolicyContext::new(""), BindingKind::Primary, None, None, &[])
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidContext { .. }));
    }

    #[test]
    fn test_contract_violation_fails_value() {
        let mut session = ValidationSession::new(
            Arc::new(Careless),
            Arc::new(CodeSystemRuleRegistry::default()),
        );
        let ctx = PolicyContext::new("Observation.code");

        let decision = session
            .coded_content_checks(&ctx, BindingKind::Primary, None, None, &[])
            .unwrap();
        assert!(decision.is_failed());
        assert!(!decision.runs(CodedContentValidationAction::VsCheckThisCode));
        assert_eq!(session.issues()[0].code, ADVISOR_CONTRACT_VIOLATION);

        // The run continues after the violation
        let again = session
            .coded_content_checks(&ctx, BindingKind::Additional, None, None, &[])
            .unwrap();
        assert!(again.is_failed());
        assert_eq!(session.issues().len(), 2);
    }

    #[test]
    fn test_invalid_profile_dropped_and_vital_sign_enforced() {
        let mut session = ValidationSession::new(
            Arc::new(Careless),
            Arc::new(CodeSystemRuleRegistry::default()),
        );
        let obs = json!({
            "resourceType": "Observation",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8310-5" }] }
        });

        let profiles = session
            .implied_profiles(&PolicyContext::new("Observation"), &obs, true)
            .unwrap();
        assert_eq!(profiles, vec!["http://hl7.org/fhir/StructureDefinition/bodytemp"]);

        let codes: Vec<_> = session.issues().iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec![ADVISOR_CONTRACT_VIOLATION, PROFILE_IMPLIED]);
    }

    #[test]
    fn test_inference_opt_out() {
        let mut session = ValidationSession::new(
            Arc::new(Careless),
            Arc::new(CodeSystemRuleRegistry::default()),
        )
        .with_clinical_profile_inference(false);
        let obs = json!({
            "resourceType": "Observation",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8310-5" }] }
        });

        let profiles = session
            .implied_profiles(&PolicyContext::new("Observation"), &obs, true)
            .unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_base_advisor_profiles_not_duplicated() {
        let mut session = session();
        let obs = json!({
            "resourceType": "Observation",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8867-4" }] }
        });

        let profiles = session
            .implied_profiles(&PolicyContext::new("Observation"), &obs, false)
            .unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(session.issues().len(), 1);
    }

    #[test]
    fn test_resource_without_type() {
        let mut session = session();
        let err = session
            .implied_profiles(&PolicyContext::new("Observation"), &json!({}), true)
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidResource { .. }));
    }

    #[test]
    fn test_code_system_nested_concepts() {
        let mut session = session();
        let cs = json!({
            "resourceType": "CodeSystem",
            "concept": [
                { "code": "a", "display": "A", "concept": [
                    { "code": "a1" }
                ] },
                { "code": "b", "display": "B" }
            ]
        });

        session.check_code_system(&cs).unwrap();
        assert_eq!(session.issues().len(), 1);
        assert_eq!(session.issues()[0].code, CONCEPT_DISPLAY_PRESENCE_MIXED);
        assert_eq!(session.issues()[0].path.as_deref(), Some("CodeSystem"));
    }

    #[test]
    fn test_code_system_consistent_displays() {
        let mut session = session();
        let cs = json!({
            "resourceType": "CodeSystem",
            "concept": [{ "code": "a", "display": "A" }, { "code": "b", "display": " " }]
        });

        session.check_code_system(&cs).unwrap();
        assert!(session.issues().is_empty());
        assert!(session.check_code_system(&json!({"resourceType": "ValueSet"})).is_err());
    }

    #[test]
    fn test_code_system_empty_display_is_missing() {
        let mut session = session();
        let cs = json!({
            "resourceType": "CodeSystem",
            "concept": [{ "code": "a", "display": "A" }, { "code": "b", "display": "" }]
        });

        session.check_code_system_at(&cs, Some(4), Some(3)).unwrap();
        assert_eq!(session.issues().len(), 1);
        let location = session.issues()[0].location.as_ref().unwrap();
        assert_eq!((location.line, location.column), (Some(4), Some(3)));
    }

    #[test]
    fn test_versioned_advisor_profile_not_repeated() {
        let mut session = ValidationSession::new(
            Arc::new(Pinned(BasePolicyAdvisor::default())),
            Arc::new(CodeSystemRuleRegistry::default()),
        );
        let obs = json!({
            "resourceType": "Observation",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8310-5" }] }
        });

        let profiles = session
            .implied_profiles(&PolicyContext::new("Observation"), &obs, true)
            .unwrap();
        assert_eq!(
            profiles,
            vec!["http://hl7.org/fhir/StructureDefinition/bodytemp|4.0.1"]
        );
        assert!(session.issues().is_empty());
    }

    #[test]
    fn test_malformed_filter_keeps_earlier_outcomes() {
        let mut session = session();
        let vs = json!({
            "resourceType": "ValueSet",
            "compose": { "include": [
                { "system": "http://loinc.org", "filter": [
                    { "property": "comment", "op": "=", "value": "x" },
                    { "property": "code", "value": "x" },
                    { "property": "concept", "op": "is-a", "value": "LP29693-6" }
                ] }
            ] }
        });

        let outcomes = session.check_value_set(&vs).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[1].valid);
        assert!(outcomes[1].rule.is_none());
        assert!(outcomes[2].valid);

        let codes: Vec<_> = session.issues().iter().map(|i| i.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                crate::terminology::filter::FILTER_PROPERTY_UNSUPPORTED,
                FILTER_VALUE_INVALID,
            ]
        );
        assert_eq!(
            session.issues()[1].path.as_deref(),
            Some("ValueSet.compose.include[0].filter[1]")
        );
    }

    #[test]
    fn test_value_set_filters() {
        let mut session = session();
        let vs = json!({
            "resourceType": "ValueSet",
            "compose": {
                "include": [
                    { "system": CPT_SYSTEM, "filter": [
                        { "property": "code", "op": "=", "value": "99213" },
                        { "property": "telemedicine", "op": "=", "value": "true" }
                    ] },
                    { "filter": [{ "property": "concept", "op": "is-a", "value": "x" }] }
                ],
                "exclude": [
                    { "system": "http://snomed.info/sct", "filter": [
                        { "property": "concept", "op": "regex", "value": ".*" }
                    ] }
                ]
            }
        });

        let outcomes = session.check_value_set(&vs).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].valid);
        assert!(outcomes[1].valid);
        assert!(!outcomes[2].valid);

        let paths: Vec<_> = session
            .issues()
            .iter()
            .map(|i| i.path.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(
            paths,
            vec![
                "ValueSet.compose.include[0].filter[0]",
                "ValueSet.compose.include[1]",
                "ValueSet.compose.exclude[0].filter[0]",
            ]
        );
        assert!(session.into_result().error_count == 3);
    }
}
