//! Checking of value set filters (`ValueSet.compose.include.filter`) against
//! the property rules of the filtered code system.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::provider::CodeSystemRuleProvider;
use super::rules::{
    FilterRule, OperationSet, PropertyFilterType, PropertyOperation, PropertyRule,
    describe_operations,
};
use crate::validation::MessageSink;

pub const FILTER_PROPERTY_UNSUPPORTED: &str = "filter-property-unsupported";
pub const FILTER_OPERATION_UNKNOWN: &str = "filter-operation-unknown";
pub const FILTER_OPERATION_ILLEGAL: &str = "filter-operation-illegal";
pub const FILTER_VALUE_MISSING: &str = "filter-value-missing";
pub const FILTER_VALUE_INVALID: &str = "filter-value-invalid";

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("decimal pattern")
});

/// One `filter` entry of a value set include or exclude
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetFilter {
    pub property: String,
    pub op: String,
    #[serde(default)]
    pub value: String,
}

impl ValueSetFilter {
    pub fn new(
        property: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            op: op.into(),
            value: value.into(),
        }
    }
}

/// What checking one filter established
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCheckOutcome {
    /// Rule the filter was checked against, when the property is supported
    pub rule: Option<PropertyRule>,
    /// Whether the filter is usable as written
    pub valid: bool,
    /// Code values that must be confirmed by the terminology subsystem
    pub pending_code_lookups: Vec<String>,
}

/// Check one filter against the provider for `system`.
///
/// Findings go to `messages`; the returned outcome tells the caller whether
/// the filter is usable and which codes still need a terminology lookup.
pub fn check_filter(
    provider: &dyn CodeSystemRuleProvider,
    system: &str,
    filter: &ValueSetFilter,
    path: &str,
    messages: &mut dyn MessageSink,
) -> FilterCheckOutcome {
    let mut outcome = FilterCheckOutcome::default();

    let Some(op) = PropertyOperation::from_code(&filter.op) else {
        messages.rule(
            FILTER_OPERATION_UNKNOWN,
            path,
            false,
            &format!("The filter operation '{}' is not known", filter.op),
        );
        return outcome;
    };

    let rule = match provider.rules_for_filter(&filter.property, OperationSet::all()) {
        FilterRule::Found(rule) => rule,
        FilterRule::Unsupported => {
            messages.rule(
                FILTER_PROPERTY_UNSUPPORTED,
                path,
                false,
                &format!(
                    "The property '{}' is not supported as a filter for the code system '{}'",
                    filter.property, system
                ),
            );
            return outcome;
        }
    };
    outcome.rule = Some(rule);

    if !messages.rule(
        FILTER_OPERATION_ILLEGAL,
        path,
        rule.allows(op),
        &format!(
            "The operation '{}' is not allowed for the property '{}' in the code system '{}' (allowed: {})",
            op,
            filter.property,
            system,
            describe_operations(&rule.legal_operations)
        ),
    ) {
        return outcome;
    }

    let value = filter.value.trim();
    if !messages.rule(
        FILTER_VALUE_MISSING,
        path,
        !value.is_empty(),
        &format!("The filter on '{}' has no value", filter.property),
    ) {
        return outcome;
    }

    let values: Vec<&str> = match op {
        PropertyOperation::In | PropertyOperation::NotIn => {
            value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
        }
        _ => vec![value],
    };

    if !messages.rule(
        FILTER_VALUE_MISSING,
        path,
        !values.is_empty(),
        &format!("The filter on '{}' lists no values", filter.property),
    ) {
        return outcome;
    }

    outcome.valid = match op {
        PropertyOperation::Exists => check_value(
            PropertyFilterType::Boolean,
            value,
            &filter.property,
            path,
            messages,
        ),
        PropertyOperation::RegEx => {
            let compiled = Regex::new(value);
            messages.rule(
                FILTER_VALUE_INVALID,
                path,
                compiled.is_ok(),
                &format!(
                    "The regular expression '{}' on '{}' is not valid: {}",
                    value,
                    filter.property,
                    compiled.as_ref().err().map(|e| e.to_string()).unwrap_or_default()
                ),
            )
        }
        _ => values.iter().fold(true, |ok, v| {
            check_value(rule.value_kind, v, &filter.property, path, messages) && ok
        }),
    };

    if outcome.valid && rule.requires_known_code() && op != PropertyOperation::RegEx {
        outcome.pending_code_lookups = values.iter().map(|v| v.to_string()).collect();
    }

    outcome
}

fn check_value(
    kind: PropertyFilterType,
    value: &str,
    property: &str,
    path: &str,
    messages: &mut dyn MessageSink,
) -> bool {
    messages.rule(
        FILTER_VALUE_INVALID,
        path,
        is_valid_value(kind, value),
        &format!(
            "The value '{}' for the filter on '{}' is not a valid {}",
            value, property, kind
        ),
    )
}

/// Whether `value` is a legal literal for a property of `kind`
pub fn is_valid_value(kind: PropertyFilterType, value: &str) -> bool {
    match kind {
        PropertyFilterType::Boolean => matches!(value, "true" | "false"),
        PropertyFilterType::Decimal => DECIMAL.is_match(value),
        PropertyFilterType::DateTime => is_fhir_date_time(value),
        PropertyFilterType::Code => !value.is_empty() && value.trim() == value,
        PropertyFilterType::String => !value.is_empty(),
    }
}

/// Accepts the FHIR date and dateTime forms: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`,
/// and full timestamps with or without an offset.
fn is_fhir_date_time(value: &str) -> bool {
    match value.len() {
        4 => value.chars().all(|c| c.is_ascii_digit()),
        7 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok(),
        10 => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        _ => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
    }
}
