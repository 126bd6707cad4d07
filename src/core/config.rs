use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::policy::{ContainedReferenceValidationPolicy, ReferenceValidationPolicy};

/// Configuration for the policy engine.
///
/// Every field has a default, so a JSON document only needs the settings it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    pub reference_policy: ReferenceValidationPolicy,
    pub contained_policy: ContainedReferenceValidationPolicy,
    /// Add the mandatory vital-signs profiles even when the advisor omits them
    pub infer_clinical_profiles: bool,
    pub suppression: SuppressionRules,
    pub session: SessionConfig,
}

/// Checks a host has chosen to skip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuppressionRules {
    /// Value set URLs whose coded content is not checked
    pub value_sets: HashSet<String>,
    /// Code system URLs whose coded content is not checked
    pub code_systems: HashSet<String>,
    /// Instance path prefixes below which references are not followed
    pub reference_paths: Vec<String>,
    /// Element definition paths whose status check is skipped
    pub status_check_elements: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Upper bound on validation units run at once by the batch helpers
    pub max_concurrent_sessions: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reference_policy: ReferenceValidationPolicy::CheckValid,
            contained_policy: ContainedReferenceValidationPolicy::CheckValid,
            infer_clinical_profiles: true,
            suppression: SuppressionRules::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: num_cpus::get(),
        }
    }
}

impl PolicyConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded policy configuration from {}", path.display());
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.max_concurrent_sessions == 0 {
            return Err(PolicyError::config(
                "session.maxConcurrentSessions must be at least 1",
            ));
        }
        if let Some(prefix) = self
            .suppression
            .reference_paths
            .iter()
            .find(|p| p.trim().is_empty())
        {
            return Err(PolicyError::config(format!(
                "suppression.referencePaths contains a blank prefix: {prefix:?}"
            )));
        }
        Ok(())
    }

    pub fn with_reference_policy(mut self, policy: ReferenceValidationPolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    pub fn with_contained_policy(mut self, policy: ContainedReferenceValidationPolicy) -> Self {
        self.contained_policy = policy;
        self
    }

    /// Turning this off lets resources skip the mandatory vital-signs profiles
    pub fn with_clinical_profile_inference(mut self, enabled: bool) -> Self {
        self.infer_clinical_profiles = enabled;
        self
    }

    pub fn with_suppression(mut self, suppression: SuppressionRules) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

impl SuppressionRules {
    pub fn is_empty(&self) -> bool {
        self.value_sets.is_empty()
            && self.code_systems.is_empty()
            && self.reference_paths.is_empty()
            && self.status_check_elements.is_empty()
    }

    pub fn skip_value_set(mut self, url: impl Into<String>) -> Self {
        self.value_sets.insert(url.into());
        self
    }

    pub fn skip_code_system(mut self, url: impl Into<String>) -> Self {
        self.code_systems.insert(url.into());
        self
    }

    pub fn ignore_references_under(mut self, path_prefix: impl Into<String>) -> Self {
        self.reference_paths.push(path_prefix.into());
        self
    }

    pub fn skip_status_check(mut self, element_path: impl Into<String>) -> Self {
        self.status_check_elements.insert(element_path.into());
        self
    }
}
