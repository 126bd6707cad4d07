//! Property rule values: what a value set filter may do with one code system
//! property.

use std::fmt;

use crate::types::{Flag, FlagSet};

/// Value set filter operators (`ValueSet.compose.include.filter.op`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyOperation {
    Equals,
    IsA,
    DescendentOf,
    IsNotA,
    RegEx,
    In,
    NotIn,
    Generalizes,
    ChildOf,
    DescendentLeaf,
    Exists,
}

impl Flag for PropertyOperation {
    const ALL: &'static [Self] = &[
        PropertyOperation::Equals,
        PropertyOperation::IsA,
        PropertyOperation::DescendentOf,
        PropertyOperation::IsNotA,
        PropertyOperation::RegEx,
        PropertyOperation::In,
        PropertyOperation::NotIn,
        PropertyOperation::Generalizes,
        PropertyOperation::ChildOf,
        PropertyOperation::DescendentLeaf,
        PropertyOperation::Exists,
    ];

    fn bit_index(self) -> u32 {
        self as u32
    }
}

impl PropertyOperation {
    /// Parse the FHIR `filter-operator` code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "=" => Some(PropertyOperation::Equals),
            "is-a" => Some(PropertyOperation::IsA),
            "descendent-of" => Some(PropertyOperation::DescendentOf),
            "is-not-a" => Some(PropertyOperation::IsNotA),
            "regex" => Some(PropertyOperation::RegEx),
            "in" => Some(PropertyOperation::In),
            "not-in" => Some(PropertyOperation::NotIn),
            "generalizes" => Some(PropertyOperation::Generalizes),
            "child-of" => Some(PropertyOperation::ChildOf),
            "descendent-leaf" => Some(PropertyOperation::DescendentLeaf),
            "exists" => Some(PropertyOperation::Exists),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PropertyOperation::Equals => "=",
            PropertyOperation::IsA => "is-a",
            PropertyOperation::DescendentOf => "descendent-of",
            PropertyOperation::IsNotA => "is-not-a",
            PropertyOperation::RegEx => "regex",
            PropertyOperation::In => "in",
            PropertyOperation::NotIn => "not-in",
            PropertyOperation::Generalizes => "generalizes",
            PropertyOperation::ChildOf => "child-of",
            PropertyOperation::DescendentLeaf => "descendent-leaf",
            PropertyOperation::Exists => "exists",
        }
    }
}

impl fmt::Display for PropertyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Set of filter operators
pub type OperationSet = FlagSet<PropertyOperation>;

/// Render an operation set as `'=', 'regex'` for messages
pub fn describe_operations(ops: &OperationSet) -> String {
    if ops.is_empty() {
        return "(none)".to_string();
    }
    ops.iter()
        .map(|op| format!("'{}'", op.code()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Kind of value a filter on the property carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyFilterType {
    Code,
    Boolean,
    DateTime,
    Decimal,
    String,
}

impl fmt::Display for PropertyFilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyFilterType::Code => "code",
            PropertyFilterType::Boolean => "boolean",
            PropertyFilterType::DateTime => "dateTime",
            PropertyFilterType::Decimal => "decimal",
            PropertyFilterType::String => "string",
        };
        f.write_str(name)
    }
}

/// How strictly a code-valued filter value is checked against the code system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeValidationRule {
    /// The value is not looked up
    None,
    /// The value must be a code defined by the code system
    Error,
}

/// Legality data for one filterable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRule {
    pub value_kind: PropertyFilterType,
    /// `None` when the property carries no code-strictness rule
    pub strictness: Option<CodeValidationRule>,
    pub legal_operations: OperationSet,
}

impl PropertyRule {
    pub fn new(
        value_kind: PropertyFilterType,
        strictness: Option<CodeValidationRule>,
        legal_operations: OperationSet,
    ) -> Self {
        Self {
            value_kind,
            strictness,
            legal_operations,
        }
    }

    /// Rule for a property that imposes no operator restriction: the requested
    /// operators pass through unchanged.
    pub fn passthrough(
        value_kind: PropertyFilterType,
        strictness: Option<CodeValidationRule>,
        requested: OperationSet,
    ) -> Self {
        Self::new(value_kind, strictness, requested)
    }

    /// Rule for a property limited to `allowed`; only requested operators that
    /// are also allowed survive.
    pub fn restricted(
        value_kind: PropertyFilterType,
        strictness: Option<CodeValidationRule>,
        requested: OperationSet,
        allowed: &[PropertyOperation],
    ) -> Self {
        Self::new(value_kind, strictness, requested & OperationSet::of(allowed))
    }

    pub fn allows(&self, op: PropertyOperation) -> bool {
        self.legal_operations.contains(op)
    }

    pub fn requires_known_code(&self) -> bool {
        self.value_kind == PropertyFilterType::Code
            && self.strictness == Some(CodeValidationRule::Error)
    }
}

/// Outcome of a property rule lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRule {
    Found(PropertyRule),
    /// The property is not a recognized filter target for this code system
    Unsupported,
}

impl FilterRule {
    pub fn is_supported(&self) -> bool {
        matches!(self, FilterRule::Found(_))
    }

    pub fn rule(&self) -> Option<&PropertyRule> {
        match self {
            FilterRule::Found(rule) => Some(rule),
            FilterRule::Unsupported => None,
        }
    }
}

impl From<PropertyRule> for FilterRule {
    fn from(rule: PropertyRule) -> Self {
        FilterRule::Found(rule)
    }
}
