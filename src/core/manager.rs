use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::core::PolicyConfig;
use crate::error::{PolicyError, Result};
use crate::policy::{RulesDrivenPolicyAdvisor, ValidationPolicyAdvisor};
use crate::terminology::CodeSystemRuleRegistry;
use crate::validation::{ValidationResult, ValidationSession};

/// Shared entry point for validation sessions.
///
/// Holds the advisor and the rule registry behind `Arc` so any number of
/// sessions, on any number of threads, can use them at once.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    advisor: Arc<dyn ValidationPolicyAdvisor>,
    registry: Arc<CodeSystemRuleRegistry>,
    config: PolicyConfig,
}

impl PolicyEngine {
    /// Engine using the configured suppression rules over the base advisor,
    /// and the default rule registry
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let advisor: Arc<dyn ValidationPolicyAdvisor> =
            Arc::new(RulesDrivenPolicyAdvisor::from_config(&config));
        tracing::info!(
            "Policy engine ready: references {:?}, contained {:?}",
            config.reference_policy,
            config.contained_policy
        );
        if !config.infer_clinical_profiles {
            tracing::warn!("Vital-signs profile inference is disabled by configuration");
        }
        Ok(Self {
            advisor,
            registry: Arc::new(CodeSystemRuleRegistry::with_defaults()),
            config,
        })
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn ValidationPolicyAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_registry(mut self, registry: CodeSystemRuleRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn advisor(&self) -> &Arc<dyn ValidationPolicyAdvisor> {
        &self.advisor
    }

    pub fn registry(&self) -> &Arc<CodeSystemRuleRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Start a new session; sessions share nothing mutable
    pub fn session(&self) -> ValidationSession {
        ValidationSession::new(Arc::clone(&self.advisor), Arc::clone(&self.registry))
            .with_clinical_profile_inference(self.config.infer_clinical_profiles)
    }

    /// Check one CodeSystem or ValueSet resource in a fresh session
    pub fn check_terminology_resource(&self, resource: &Value) -> Result<ValidationResult> {
        let mut session = self.session();
        match resource.get("resourceType").and_then(Value::as_str) {
            Some("CodeSystem") => session.check_code_system(resource)?,
            Some("ValueSet") => {
                session.check_value_set(resource)?;
            }
            other => {
                return Err(PolicyError::invalid_resource(format!(
                    "expected a CodeSystem or ValueSet, found {}",
                    other.unwrap_or("no resourceType")
                )));
            }
        }
        Ok(session.into_result())
    }

    /// Check many terminology resources, each in its own session.
    ///
    /// At most `session.max_concurrent_sessions` run at once. Results keep the
    /// input order.
    pub async fn check_terminology_batch(
        &self,
        resources: Vec<Value>,
    ) -> Vec<Result<ValidationResult>> {
        let permits = Arc::new(Semaphore::new(self.config.session.max_concurrent_sessions));
        tracing::debug!(
            "Checking {} resources with up to {} sessions",
            resources.len(),
            self.config.session.max_concurrent_sessions
        );

        let tasks = resources.into_iter().map(|resource| {
            let engine = self.clone();
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| PolicyError::config(format!("Failed to acquire session permit: {e}")))?;
                tokio::task::spawn_blocking(move || engine.check_terminology_resource(&resource))
                    .await?
            }
        });

        join_all(tasks).await
    }
}
