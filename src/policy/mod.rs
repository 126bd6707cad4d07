//! Validation policy: which checks run for a resource, element, reference,
//! contained resource or coded value.
//!
//! The [`ValidationPolicyAdvisor`] trait is the customization surface for host
//! applications. A host replaces or wraps [`BasePolicyAdvisor`] to trade
//! validation completeness for speed or to silence known noise.
//!
//! # Example
//!
//! ```
//! use octofhir_validation_policy::policy::{
//!     BasePolicyAdvisor, ElementCheckSet, PolicyContext, ValidationPolicyAdvisor,
//! };
//!
//! let advisor = BasePolicyAdvisor::default();
//! let ctx = PolicyContext::new("Patient.name[0]").with_element("Patient.name");
//!
//! assert_eq!(advisor.policy_for_element(&ctx), ElementCheckSet::all());
//! ```

pub mod advisor;
pub mod rules;
pub mod vital_signs;

use std::any::Any;
use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

use crate::types::{Flag, FlagSet};
use crate::validation::MessageSink;

pub use advisor::BasePolicyAdvisor;
pub use rules::RulesDrivenPolicyAdvisor;

/// Checks applied to a resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceValidationAction {
    BaseType,
    StatedProfiles,
    MetaProfiles,
    GlobalProfiles,
}

impl Flag for ResourceValidationAction {
    const ALL: &'static [Self] = &[
        ResourceValidationAction::BaseType,
        ResourceValidationAction::StatedProfiles,
        ResourceValidationAction::MetaProfiles,
        ResourceValidationAction::GlobalProfiles,
    ];

    fn bit_index(self) -> u32 {
        self as u32
    }
}

/// Checks applied to one element definition occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementValidationAction {
    /// Cardinality checks made during slice matching run regardless
    Cardinality,
    Invariants,
    Bindings,
    AdditionalBindings,
    StatusCheck,
}

impl Flag for ElementValidationAction {
    const ALL: &'static [Self] = &[
        ElementValidationAction::Cardinality,
        ElementValidationAction::Invariants,
        ElementValidationAction::Bindings,
        ElementValidationAction::AdditionalBindings,
        ElementValidationAction::StatusCheck,
    ];

    fn bit_index(self) -> u32 {
        self as u32
    }
}

/// Terminology checks applied to one coded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodedContentValidationAction {
    /// Check membership in the bound value set
    VsCheck,
    /// Check membership for this code even when another coding matched
    VsCheckThisCode,
    /// Report codes the code system does not define
    NotFound,
    InvalidCode,
    InvalidDisplay,
    /// Report codes whose system cannot be inferred
    CannotInfer,
    CodeRule,
    /// Report problems with the value set itself
    VsInvalid,
    StatusCheck,
}

impl Flag for CodedContentValidationAction {
    const ALL: &'static [Self] = &[
        CodedContentValidationAction::VsCheck,
        CodedContentValidationAction::VsCheckThisCode,
        CodedContentValidationAction::NotFound,
        CodedContentValidationAction::InvalidCode,
        CodedContentValidationAction::InvalidDisplay,
        CodedContentValidationAction::CannotInfer,
        CodedContentValidationAction::CodeRule,
        CodedContentValidationAction::VsInvalid,
        CodedContentValidationAction::StatusCheck,
    ];

    fn bit_index(self) -> u32 {
        self as u32
    }
}

pub type ResourceCheckSet = FlagSet<ResourceValidationAction>;
pub type ElementCheckSet = FlagSet<ElementValidationAction>;
pub type CodedContentCheckSet = FlagSet<CodedContentValidationAction>;

/// How the target of a `Reference.reference` is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceValidationPolicy {
    Ignore,
    CheckTypeIfExists,
    CheckExists,
    CheckExistsAndType,
    CheckValid,
}

impl ReferenceValidationPolicy {
    pub fn ignore(&self) -> bool {
        *self == ReferenceValidationPolicy::Ignore
    }

    pub fn check_exists(&self) -> bool {
        matches!(
            self,
            ReferenceValidationPolicy::CheckExists
                | ReferenceValidationPolicy::CheckExistsAndType
                | ReferenceValidationPolicy::CheckValid
        )
    }

    pub fn check_type(&self) -> bool {
        matches!(
            self,
            ReferenceValidationPolicy::CheckTypeIfExists
                | ReferenceValidationPolicy::CheckExistsAndType
                | ReferenceValidationPolicy::CheckValid
        )
    }

    pub fn check_valid(&self) -> bool {
        *self == ReferenceValidationPolicy::CheckValid
    }
}

/// How a contained, bundled or parameter resource is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainedReferenceValidationPolicy {
    Ignore,
    CheckType,
    CheckValid,
}

impl ContainedReferenceValidationPolicy {
    pub fn ignore(&self) -> bool {
        *self == ContainedReferenceValidationPolicy::Ignore
    }

    pub fn check_type(&self) -> bool {
        !self.ignore()
    }

    pub fn check_valid(&self) -> bool {
        *self == ContainedReferenceValidationPolicy::CheckValid
    }
}

/// Where an embedded resource sits in its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialElement {
    Contained,
    BundleEntry,
    BundleOutcome,
    BundleIssues,
    Parameter,
    Logical,
}

impl SpecialElement {
    /// Classify the element `property` of an element of type `parent_type`
    /// that holds a resource.
    pub fn classify(parent_type: &str, property: &str) -> Option<Self> {
        match (parent_type, property) {
            (_, "contained") => Some(SpecialElement::Contained),
            ("Bundle.entry", "resource") => Some(SpecialElement::BundleEntry),
            ("Bundle.entry.response", "outcome") => Some(SpecialElement::BundleOutcome),
            ("Bundle", "issues") => Some(SpecialElement::BundleIssues),
            ("Parameters.parameter", "resource") => Some(SpecialElement::Parameter),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecialElement::Contained => "contained resource",
            SpecialElement::BundleEntry => "bundle entry",
            SpecialElement::BundleOutcome => "bundle outcome",
            SpecialElement::BundleIssues => "bundle issues",
            SpecialElement::Parameter => "parameter",
            SpecialElement::Logical => "logical",
        };
        f.write_str(name)
    }
}

/// Part of a binding being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Primary,
    MaxValueSet,
    Additional,
}

/// `ElementDefinition.binding.additional.purpose`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdditionalBindingPurpose {
    Minimum,
    Required,
    Extensible,
    Current,
    Preferred,
    Ui,
}

impl AdditionalBindingPurpose {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "minimum" => Some(AdditionalBindingPurpose::Minimum),
            "required" => Some(AdditionalBindingPurpose::Required),
            "extensible" => Some(AdditionalBindingPurpose::Extensible),
            "current" => Some(AdditionalBindingPurpose::Current),
            "preferred" => Some(AdditionalBindingPurpose::Preferred),
            "ui" => Some(AdditionalBindingPurpose::Ui),
            _ => None,
        }
    }
}

/// Where a decision is being asked for.
///
/// Borrowed from the caller for the duration of one decision call.
#[derive(Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Opaque value the host passed in when validation started
    pub app_context: Option<&'a (dyn Any + Send + Sync)>,
    /// Path in the instance that led to this decision
    pub path: &'a str,
    /// Canonical URL of the structure being validated against
    pub structure_url: Option<&'a str>,
    /// Path of the element definition being validated against
    pub element_path: Option<&'a str>,
}

impl<'a> PolicyContext<'a> {
    pub fn new(path: &'a str) -> Self {
        Self {
            app_context: None,
            path,
            structure_url: None,
            element_path: None,
        }
    }

    pub fn with_app_context(mut self, app_context: &'a (dyn Any + Send + Sync)) -> Self {
        self.app_context = Some(app_context);
        self
    }

    pub fn with_structure(mut self, structure_url: &'a str) -> Self {
        self.structure_url = Some(structure_url);
        self
    }

    pub fn with_element(mut self, element_path: &'a str) -> Self {
        self.element_path = Some(element_path);
        self
    }

    /// Downcast the app context
    pub fn app_context_as<T: Any>(&self) -> Option<&'a T> {
        self.app_context.and_then(|ctx| ctx.downcast_ref::<T>())
    }
}

impl Debug for PolicyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("app_context", &self.app_context.map(|_| ".."))
            .field("path", &self.path)
            .field("structure_url", &self.structure_url)
            .field("element_path", &self.element_path)
            .finish()
    }
}

/// The resource embedded in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainmentContext<'a> {
    pub container_type: &'a str,
    pub container_id: Option<&'a str>,
    pub kind: SpecialElement,
}

impl<'a> ContainmentContext<'a> {
    pub fn new(container_type: &'a str, container_id: Option<&'a str>, kind: SpecialElement) -> Self {
        Self {
            container_type,
            container_id,
            kind,
        }
    }
}

/// Decides which checks a validator performs.
///
/// Implementations are shared by concurrent validation units, so they hold
/// only configuration fixed at construction. Every method is a pure decision:
/// unknown contexts get the most complete checking, and nothing here fails.
pub trait ValidationPolicyAdvisor: Send + Sync + Debug {
    /// How to validate the target of a reference found at `ctx.path`.
    ///
    /// `url` is the profile the containing resource is validated against.
    fn policy_for_reference(&self, ctx: &PolicyContext<'_>, url: &str) -> ReferenceValidationPolicy;

    /// How deeply to validate a resource embedded in a container
    fn policy_for_contained(
        &self,
        ctx: &PolicyContext<'_>,
        containment: &ContainmentContext<'_>,
    ) -> ContainedReferenceValidationPolicy;

    /// Which resource-level checks apply
    fn policy_for_resource(&self, ctx: &PolicyContext<'_>) -> ResourceCheckSet;

    /// Which element-level checks apply
    fn policy_for_element(&self, ctx: &PolicyContext<'_>) -> ElementCheckSet;

    /// Which terminology checks run for one coded value.
    ///
    /// Asked before any terminology call is made. `systems` lists the code
    /// systems present in the instance and is empty for a bare code.
    fn policy_for_coded_content(
        &self,
        ctx: &PolicyContext<'_>,
        kind: BindingKind,
        purpose: Option<AdditionalBindingPurpose>,
        value_set: Option<&str>,
        systems: &[String],
    ) -> CodedContentCheckSet;

    /// Profiles to apply to `resource` beyond those it declares.
    ///
    /// Called once per resource after base validation. `messages` receives
    /// information messages explaining why profiles were or were not added.
    fn implied_profiles(
        &self,
        ctx: &PolicyContext<'_>,
        resource: &serde_json::Value,
        valid: bool,
        messages: &mut dyn MessageSink,
    ) -> Vec<String>;
}
