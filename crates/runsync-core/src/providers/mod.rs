//! Provider status adapters and the registry the worker dispatches through.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{LaboratoryRun, ObservedStatus, Platform};

mod healthomics;
mod seqera;

pub use healthomics::HealthOmicsAdapter;
pub use seqera::SeqeraAdapter;

/// Reads the current status of one run from its execution provider.
///
/// Implementations normalize at the boundary: the returned value carries the
/// raw provider string together with its canonical form and terminal flag.
pub trait ProviderStatusAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn fetch_status(&self, run: &LaboratoryRun) -> Result<ObservedStatus>;
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Platform, Arc<dyn ProviderStatusAdapter>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own platform tag, replacing any
    /// previous registration.
    pub fn register(&mut self, adapter: Arc<dyn ProviderStatusAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn ProviderStatusAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn ProviderStatusAdapter>> {
        self.adapters.get(&platform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort_by_key(|platform| platform.as_str());
        platforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::observe;

    struct Fixed(Platform, &'static str);

    impl ProviderStatusAdapter for Fixed {
        fn platform(&self) -> Platform {
            self.0
        }

        fn fetch_status(&self, _run: &LaboratoryRun) -> Result<ObservedStatus> {
            Ok(observe(self.0, self.1))
        }
    }

    #[test]
    fn registry_dispatches_by_platform_tag() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(Fixed(Platform::AwsHealthOmics, "RUNNING")))
            .with(Arc::new(Fixed(Platform::SeqeraCloud, "SUBMITTED")));
        assert_eq!(
            registry.platforms(),
            vec![Platform::AwsHealthOmics, Platform::SeqeraCloud]
        );
        let adapter = registry.get(Platform::SeqeraCloud).expect("registered");
        assert_eq!(adapter.platform(), Platform::SeqeraCloud);
    }

    #[test]
    fn later_registration_replaces_earlier_one() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Fixed(Platform::SeqeraCloud, "RUNNING")));
        registry.register(Arc::new(Fixed(Platform::SeqeraCloud, "FAILED")));
        assert_eq!(registry.platforms().len(), 1);
        assert!(registry.get(Platform::AwsHealthOmics).is_none());
    }
}
