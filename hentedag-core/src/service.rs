//! High-level service facade combining discovery, fetching, and resolution.

use std::sync::Arc;

use chrono::Local;
use reqwest::Client;
use tracing::debug;

use crate::discovery::{self, CadastreLookup, DiscoveryOutcome, ProgressSink};
use crate::model::{AddressBinding, NextPickupSummary, NormalizedPickup, ProviderMeta};
use crate::normalize::normalize;
use crate::plugin::ProviderRegistry;
use crate::ports::PortError;
use crate::resolve::resolve;

#[derive(Debug, Clone)]
/// Everything one calendar fetch produced: the per-category pickups plus
/// the resolved next-pickup summary.
pub struct CalendarSnapshot {
    /// Earliest upcoming date per canonical category.
    pub pickups: Vec<NormalizedPickup>,
    /// Tie-set summary, or `None` when no upcoming pickups are known.
    pub summary: Option<NextPickupSummary>,
}

/// Public entry point for discovering addresses and fetching calendars.
pub struct CalendarService {
    registry: Arc<ProviderRegistry>,
    cadastre: CadastreLookup,
}

impl CalendarService {
    /// Create a new service bound to the provided registry, using `client`
    /// for the cadastre lookups made during discovery.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, client: Client) -> Self {
        Self {
            registry,
            cadastre: CadastreLookup::new(client),
        }
    }

    /// List all registered providers in discovery priority order.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.registry.providers()
    }

    /// Resolve a free-text address against the provider chain.
    pub async fn discover(&self, address: &str, progress: &dyn ProgressSink) -> DiscoveryOutcome {
        discovery::discover(&self.registry, Some(&self.cadastre), address, progress).await
    }

    /// Fetch, normalize, and resolve the calendar behind `binding`.
    ///
    /// A snapshot with `summary: None` means the provider answered but
    /// currently lists no upcoming pickups; that is distinct from a fetch
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the binding names an unregistered
    /// provider or the provider request fails.
    pub async fn fetch_calendar(
        &self,
        binding: &AddressBinding,
    ) -> Result<CalendarSnapshot, PortError> {
        let plugin = self.registry.plugin(binding.provider)?;
        let raw = plugin.calendar.calendar(binding).await?;
        debug!(
            provider = %plugin.meta.name,
            labels = raw.len(),
            "calendar fetched"
        );
        let pickups = normalize(&raw);
        let today = Local::now().date_naive();
        let summary = resolve(today, &pickups);
        Ok(CalendarSnapshot { pickups, summary })
    }
}
