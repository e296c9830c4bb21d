//! Provider implementation for ReMidt IKS via renovasjonsportal.no.

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

const BASE_URL: &str = "https://kalender.renovasjonsportal.no/api/address";

/// Combined fraction ReMidt reports for glass and metal packaging.
const GLASS_METAL_COMBINED: &str = "Glass og metallemballasje";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "searchResults", default)]
    search_results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    disposals: Vec<Disposal>,
}

/// One scheduled disposal from /api/address/{id}/details.
#[derive(Debug, Deserialize)]
struct Disposal {
    /// ISO timestamp of the pickup.
    date: String,
    /// Fraction label, e.g. “Restavfall”.
    fraction: String,
}

/// Address probe backed by the renovasjonsportal address search.
pub struct ReMidtAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl ReMidtAddressPort {
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
impl AddressProbe for ReMidtAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let request = self
            .client
            .get(format!("{BASE_URL}/{}", query.full_address()));
        let response = fetch_json::<SearchResponse>(request).await?;
        let Some(hit) = response.search_results.into_iter().next() else {
            return Ok(None);
        };
        debug!(id = %hit.id, "address found");
        Ok(Some(ProbeMatch { address_id: hit.id }))
    }
}

/// Calendar implementation backed by the renovasjonsportal details endpoint.
pub struct ReMidtCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl ReMidtCalendarPort {
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
impl CalendarPort for ReMidtCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let request = self
            .client
            .get(format!("{BASE_URL}/{}/details", binding.address_id));
        let response = fetch_json::<DetailsResponse>(request).await?;
        collect_calendar(response.disposals)
    }
}

/// Collapse disposals into a raw calendar, splitting the combined
/// glass/metal fraction into its two labels.
fn collect_calendar(disposals: Vec<Disposal>) -> Result<RawCalendar, PortError> {
    let mut calendar = RawCalendar::new();
    for disposal in disposals {
        let date = parse_iso_date(&disposal.date)?;
        if disposal.fraction == GLASS_METAL_COMBINED {
            calendar.insert_earliest("Glass", date);
            calendar.insert_earliest("Metall", date);
        } else {
            calendar.insert_earliest(disposal.fraction, date);
        }
    }
    Ok(calendar)
}

/// Build the plugin bundle for the ReMidt provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(ReMidtAddressPort::new(client.clone()));
    let calendar = Arc::new(ReMidtCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::ReMidt)
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
