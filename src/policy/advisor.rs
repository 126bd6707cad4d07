use serde_json::Value;

use super::{
    AdditionalBindingPurpose, BindingKind, CodedContentCheckSet, CodedContentValidationAction,
    ContainedReferenceValidationPolicy, ContainmentContext, ElementCheckSet, PolicyContext,
    ReferenceValidationPolicy, ResourceCheckSet, ValidationPolicyAdvisor, vital_signs,
};
use crate::core::PolicyConfig;
use crate::validation::MessageSink;

/// Advisor for full validation.
///
/// Every check is enabled, references and contained resources are handled by
/// the configured policies, and vital-sign observations get their mandatory
/// profiles. Custom advisors usually wrap this one.
#[derive(Debug, Clone)]
pub struct BasePolicyAdvisor {
    reference_policy: ReferenceValidationPolicy,
    contained_policy: ContainedReferenceValidationPolicy,
}

impl Default for BasePolicyAdvisor {
    fn default() -> Self {
        Self::new(
            ReferenceValidationPolicy::CheckValid,
            ContainedReferenceValidationPolicy::CheckValid,
        )
    }
}

impl BasePolicyAdvisor {
    pub fn new(
        reference_policy: ReferenceValidationPolicy,
        contained_policy: ContainedReferenceValidationPolicy,
    ) -> Self {
        Self {
            reference_policy,
            contained_policy,
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.reference_policy, config.contained_policy)
    }

    pub fn reference_policy(&self) -> ReferenceValidationPolicy {
        self.reference_policy
    }

    pub fn contained_policy(&self) -> ContainedReferenceValidationPolicy {
        self.contained_policy
    }
}

impl ValidationPolicyAdvisor for BasePolicyAdvisor {
    fn policy_for_reference(&self, _ctx: &PolicyContext<'_>, _url: &str) -> ReferenceValidationPolicy {
        self.reference_policy
    }

    fn policy_for_contained(
        &self,
        _ctx: &PolicyContext<'_>,
        _containment: &ContainmentContext<'_>,
    ) -> ContainedReferenceValidationPolicy {
        self.contained_policy
    }

    fn policy_for_resource(&self, _ctx: &PolicyContext<'_>) -> ResourceCheckSet {
        ResourceCheckSet::all()
    }

    fn policy_for_element(&self, _ctx: &PolicyContext<'_>) -> ElementCheckSet {
        ElementCheckSet::all()
    }

    fn policy_for_coded_content(
        &self,
        _ctx: &PolicyContext<'_>,
        _kind: BindingKind,
        _purpose: Option<AdditionalBindingPurpose>,
        _value_set: Option<&str>,
        systems: &[String],
    ) -> CodedContentCheckSet {
        // A bare code has no system to infer from, so that failure is reported.
        let checks = CodedContentCheckSet::all().without(CodedContentValidationAction::CannotInfer);
        if systems.is_empty() {
            checks.with(CodedContentValidationAction::CannotInfer)
        } else {
            checks
        }
    }

    fn implied_profiles(
        &self,
        ctx: &PolicyContext<'_>,
        resource: &Value,
        _valid: bool,
        messages: &mut dyn MessageSink,
    ) -> Vec<String> {
        vital_signs::implied_profiles(resource, ctx.path, messages)
    }
}
