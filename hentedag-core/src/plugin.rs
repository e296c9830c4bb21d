//! Registry wiring provider plugins into the discovery chain.

use std::sync::Arc;

use crate::model::{ProviderId, ProviderMeta};
use crate::ports::{AddressProbe, CalendarPort, PortError};

/// Ports implementing one waste collection provider.
pub struct ProviderPlugin {
    /// Static metadata describing the provider.
    pub meta: ProviderMeta,
    /// Implementation used to probe addresses during discovery.
    pub probe: Arc<dyn AddressProbe>,
    /// Implementation used to fetch pickup calendars.
    pub calendar: Arc<dyn CalendarPort>,
}

/// Registry that resolves plugins by provider identifier.
///
/// Plugins are kept in insertion order, and that order is the discovery
/// priority: earlier plugins are probed first.
pub struct ProviderRegistry {
    plugins: Vec<ProviderPlugin>,
}

impl ProviderRegistry {
    /// Build a registry from the provided plugin list, most specific
    /// provider first.
    #[must_use]
    pub fn new(plugins: Vec<ProviderPlugin>) -> Self {
        Self { plugins }
    }

    /// Return metadata for all registered providers in priority order.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.plugins.iter().map(|plugin| plugin.meta.clone()).collect()
    }

    /// Iterator over the plugins in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderPlugin> {
        self.plugins.iter()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the registry holds no plugins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Look up the plugin for the given provider.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedProvider`] when no plugin is
    /// registered for `provider`.
    pub fn plugin(&self, provider: ProviderId) -> Result<&ProviderPlugin, PortError> {
        self.plugins
            .iter()
            .find(|plugin| plugin.meta.id == provider)
            .ok_or(PortError::UnsupportedProvider)
    }
}
