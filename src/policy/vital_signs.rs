//! Vital-signs profile inference.
//!
//! Observations coded as vital signs must conform to the vital-signs profiles
//! whether or not they declare them. This module maps LOINC and SNOMED CT
//! codes to those profiles.

use serde_json::Value;

use crate::validation::MessageSink;

pub const LOINC_SYSTEM: &str = "http://loinc.org";
pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";

pub const PROFILE_IMPLIED: &str = "profile-implied";
pub const PROFILE_ALREADY_DECLARED: &str = "profile-already-declared";

const PROFILE_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

const LOINC_VITAL_SIGNS: &[(&str, &str)] = &[
    ("85353-1", "vitalspanel"),
    ("9279-1", "resprate"),
    ("8867-4", "heartrate"),
    ("2708-6", "oxygensat"),
    ("59408-5", "oxygensat"),
    ("8310-5", "bodytemp"),
    ("8302-2", "bodyheight"),
    ("9843-4", "headcircum"),
    ("29463-7", "bodyweight"),
    ("39156-5", "bmi"),
    ("85354-9", "bp"),
];

const SNOMED_VITAL_SIGNS: &[(&str, &str)] = &[
    ("86290005", "resprate"),
    ("364075005", "heartrate"),
    ("431314004", "oxygensat"),
    ("386725007", "bodytemp"),
    ("50373000", "bodyheight"),
    ("363812007", "headcircum"),
    ("27113001", "bodyweight"),
    ("60621009", "bmi"),
    ("75367002", "bp"),
];

/// A coding that identifies the resource as a vital sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitalSignMatch {
    pub system: &'static str,
    pub code: String,
    pub profile: String,
}

/// Vital-signs profiles that `resource` must conform to, one per profile,
/// in coding order.
pub fn required_profiles(resource: &Value) -> Vec<VitalSignMatch> {
    let mut matches: Vec<VitalSignMatch> = Vec::new();
    if resource.get("resourceType").and_then(Value::as_str) != Some("Observation") {
        return matches;
    }

    let codings = resource
        .get("code")
        .and_then(|c| c.get("coding"))
        .and_then(Value::as_array);

    for coding in codings.into_iter().flatten() {
        let system = coding.get("system").and_then(Value::as_str);
        let Some(code) = coding.get("code").and_then(Value::as_str) else {
            continue;
        };
        let Some((system, name)) = lookup(system, code) else {
            continue;
        };
        let profile = format!("{PROFILE_BASE}{name}");
        if !matches.iter().any(|m| m.profile == profile) {
            matches.push(VitalSignMatch {
                system,
                code: code.to_string(),
                profile,
            });
        }
    }
    matches
}

fn lookup(system: Option<&str>, code: &str) -> Option<(&'static str, &'static str)> {
    let (system, table) = match system {
        Some(LOINC_SYSTEM) => (LOINC_SYSTEM, LOINC_VITAL_SIGNS),
        Some(SNOMED_SYSTEM) => (SNOMED_SYSTEM, SNOMED_VITAL_SIGNS),
        _ => return None,
    };
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (system, *name))
}

/// Profiles listed in `meta.profile`, without version suffixes
pub fn declared_profiles(resource: &Value) -> Vec<&str> {
    resource
        .get("meta")
        .and_then(|m| m.get("profile"))
        .and_then(Value::as_array)
        .map(|profiles| {
            profiles
                .iter()
                .filter_map(Value::as_str)
                .map(|p| p.split_once('|').map_or(p, |(url, _)| url))
                .collect()
        })
        .unwrap_or_default()
}

/// Vital-signs profiles to add to `resource`, explaining each decision in
/// `messages`.
pub fn implied_profiles(resource: &Value, path: &str, messages: &mut dyn MessageSink) -> Vec<String> {
    let declared = declared_profiles(resource);
    let mut implied = Vec::new();

    for found in required_profiles(resource) {
        if declared.contains(&found.profile.as_str()) {
            messages.hint(
                PROFILE_ALREADY_DECLARED,
                path,
                false,
                &format!(
                    "The observation code {}#{} identifies a vital sign; the profile {} is already declared",
                    found.system, found.code, found.profile
                ),
            );
            continue;
        }
        messages.hint(
            PROFILE_IMPLIED,
            path,
            false,
            &format!(
                "The observation code {}#{} identifies a vital sign, so the resource is also validated against {}",
                found.system, found.code, found.profile
            ),
        );
        implied.push(found.profile);
    }
    implied
}
