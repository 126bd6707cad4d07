use std::sync::Arc;

use serde_json::Value;

use super::{
    AdditionalBindingPurpose, BasePolicyAdvisor, BindingKind, CodedContentCheckSet,
    ContainedReferenceValidationPolicy, ContainmentContext, ElementCheckSet,
    ElementValidationAction, PolicyContext, ReferenceValidationPolicy, ResourceCheckSet,
    ValidationPolicyAdvisor,
};
use crate::core::{PolicyConfig, SuppressionRules};
use crate::validation::MessageSink;

/// Advisor that applies host suppression rules on top of another advisor.
///
/// Suppression only ever removes checks; anything the rules do not mention is
/// decided by the inner advisor, including implied profiles.
#[derive(Debug, Clone)]
pub struct RulesDrivenPolicyAdvisor {
    inner: Arc<dyn ValidationPolicyAdvisor>,
    rules: SuppressionRules,
}

impl RulesDrivenPolicyAdvisor {
    pub fn new(inner: Arc<dyn ValidationPolicyAdvisor>, rules: SuppressionRules) -> Self {
        Self { inner, rules }
    }

    /// Rules from `config` over a [`BasePolicyAdvisor`] built from the same config
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            Arc::new(BasePolicyAdvisor::from_config(config)),
            config.suppression.clone(),
        )
    }

    pub fn rules(&self) -> &SuppressionRules {
        &self.rules
    }

    fn suppresses_coded_content(&self, value_set: Option<&str>, systems: &[String]) -> bool {
        let value_set_skipped = value_set
            .map(unversioned)
            .is_some_and(|vs| self.rules.value_sets.contains(vs));
        let system_skipped = systems
            .iter()
            .any(|s| self.rules.code_systems.contains(unversioned(s)));
        value_set_skipped || system_skipped
    }
}

impl ValidationPolicyAdvisor for RulesDrivenPolicyAdvisor {
    fn policy_for_reference(&self, ctx: &PolicyContext<'_>, url: &str) -> ReferenceValidationPolicy {
        if self
            .rules
            .reference_paths
            .iter()
            .any(|prefix| ctx.path.starts_with(prefix.as_str()))
        {
            tracing::trace!("Reference at {} ignored by suppression rules", ctx.path);
            return ReferenceValidationPolicy::Ignore;
        }
        self.inner.policy_for_reference(ctx, url)
    }

    fn policy_for_contained(
        &self,
        ctx: &PolicyContext<'_>,
        containment: &ContainmentContext<'_>,
    ) -> ContainedReferenceValidationPolicy {
        self.inner.policy_for_contained(ctx, containment)
    }

    fn policy_for_resource(&self, ctx: &PolicyContext<'_>) -> ResourceCheckSet {
        self.inner.policy_for_resource(ctx)
    }

    fn policy_for_element(&self, ctx: &PolicyContext<'_>) -> ElementCheckSet {
        let checks = self.inner.policy_for_element(ctx);
        match ctx.element_path {
            Some(element) if self.rules.status_check_elements.contains(element) => {
                checks.without(ElementValidationAction::StatusCheck)
            }
            _ => checks,
        }
    }

    fn policy_for_coded_content(
        &self,
        ctx: &PolicyContext<'_>,
        kind: BindingKind,
        purpose: Option<AdditionalBindingPurpose>,
        value_set: Option<&str>,
        systems: &[String],
    ) -> CodedContentCheckSet {
        if self.suppresses_coded_content(value_set, systems) {
            tracing::trace!("Coded content at {} skipped by suppression rules", ctx.path);
            return CodedContentCheckSet::empty();
        }
        self.inner
            .policy_for_coded_content(ctx, kind, purpose, value_set, systems)
    }

    fn implied_profiles(
        &self,
        ctx: &PolicyContext<'_>,
        resource: &Value,
        valid: bool,
        messages: &mut dyn MessageSink,
    ) -> Vec<String> {
        self.inner.implied_profiles(ctx, resource, valid, messages)
    }
}

fn unversioned(url: &str) -> &str {
    url.split_once('|').map_or(url, |(u, _)| u)
}
