use std::collections::HashMap;
use std::sync::Arc;

use super::cpt::CptRuleProvider;
use super::provider::{BaseRuleProvider, CodeSystemRuleProvider};

/// Maps code system canonical URLs to rule providers.
///
/// Lookups ignore a `|version` suffix and fall back to [`BaseRuleProvider`] for
/// systems without a registered provider. The registry is built once and then
/// shared read-only between validation sessions.
#[derive(Debug, Clone)]
pub struct CodeSystemRuleRegistry {
    providers: HashMap<String, Arc<dyn CodeSystemRuleProvider>>,
    fallback: Arc<dyn CodeSystemRuleProvider>,
}

impl Default for CodeSystemRuleRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CodeSystemRuleRegistry {
    /// Registry with no system-specific providers
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            fallback: Arc::new(BaseRuleProvider::new()),
        }
    }

    /// Registry with the built-in system-specific providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CptRuleProvider::new()));
        registry
    }

    /// Register a provider under the system it reports.
    ///
    /// Providers that report no system are ignored; use
    /// [`register_for`](Self::register_for) for those.
    pub fn register(&mut self, provider: Arc<dyn CodeSystemRuleProvider>) -> &mut Self {
        let system = provider.system().map(str::to_string);
        match system {
            Some(system) => self.register_for(system, provider),
            None => {
                tracing::warn!("Ignoring code system rule provider without a system: {provider:?}");
                self
            }
        }
    }

    /// Register a provider under an explicit canonical URL
    pub fn register_for(
        &mut self,
        system: impl Into<String>,
        provider: Arc<dyn CodeSystemRuleProvider>,
    ) -> &mut Self {
        let system = strip_version(&system.into()).to_string();
        tracing::debug!("Registering code system rule provider for {}", system);
        if self.providers.insert(system.clone(), provider).is_some() {
            tracing::debug!("Replaced existing rule provider for {}", system);
        }
        self
    }

    /// Builder-style registration
    pub fn with_provider(mut self, provider: Arc<dyn CodeSystemRuleProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Provider for `system`, or the base provider
    pub fn resolve(&self, system: &str) -> Arc<dyn CodeSystemRuleProvider> {
        match self.providers.get(strip_version(system)) {
            Some(provider) => Arc::clone(provider),
            None => {
                tracing::trace!("No specific rule provider for {}, using base rules", system);
                Arc::clone(&self.fallback)
            }
        }
    }

    pub fn has_specific_provider(&self, system: &str) -> bool {
        self.providers.contains_key(strip_version(system))
    }

    /// Registered system URLs, sorted
    pub fn systems(&self) -> Vec<&str> {
        let mut systems: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        systems.sort_unstable();
        systems
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn strip_version(system: &str) -> &str {
    system.split_once('|').map_or(system, |(url, _)| url)
}
