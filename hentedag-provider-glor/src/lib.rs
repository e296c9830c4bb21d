//! Provider implementation for Glør IKS in the Lillehammer region.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use hentedag_core::{
    dates::parse_iso_date,
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const BASE_URL: &str = "https://proaktiv.glor.offcenit.no";

/// Combined fraction Glør reports for paper and bagged plastic.
const PAPER_PLASTIC_COMBINED: &str = "Papir, papp og sekker plastemballasje";

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

/// One scheduled pickup from /details.
#[derive(Debug, Deserialize)]
struct DetailEntry {
    /// Fraction label, e.g. “Restavfall”.
    fraksjon: String,
    /// ISO timestamp of the pickup.
    dato: String,
}

/// Address probe backed by Glør's proaktiv search endpoint.
pub struct GlorAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl GlorAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl AddressProbe for GlorAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let request = self
            .client
            .get(format!("{BASE_URL}/search"))
            .query(&[("q", query.full_address())]);
        let hits = fetch_json::<Vec<SearchHit>>(request).await?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        debug!(id = %hit.id, "address found");
        Ok(Some(ProbeMatch { address_id: hit.id }))
    }
}

/// Calendar implementation backed by Glør's proaktiv details endpoint.
pub struct GlorCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl GlorCalendarPort {
    /// Create a new calendar port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            meta: provider_meta(),
        }
    }
}

#[async_trait]
impl CalendarPort for GlorCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let request = self
            .client
            .get(format!("{BASE_URL}/details"))
            .query(&[("id", binding.address_id.as_str())]);
        let entries = fetch_json::<Vec<DetailEntry>>(request).await?;
        collect_calendar(entries)
    }
}

/// Collapse detail entries into a raw calendar, splitting the combined
/// paper/plastic fraction into its two labels.
fn collect_calendar(entries: Vec<DetailEntry>) -> Result<RawCalendar, PortError> {
    let mut calendar = RawCalendar::new();
    for entry in entries {
        let date = parse_iso_date(&entry.dato)?;
        if entry.fraksjon == PAPER_PLASTIC_COMBINED {
            calendar.insert_earliest("Papp", date);
            calendar.insert_earliest("Plast", date);
        } else {
            calendar.insert_earliest(entry.fraksjon, date);
        }
    }
    Ok(calendar)
}

/// Build the plugin bundle for the Glør provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(GlorAddressPort::new(client.clone()));
    let calendar = Arc::new(GlorCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Glor)
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, PortError> {
    request
        .send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}
