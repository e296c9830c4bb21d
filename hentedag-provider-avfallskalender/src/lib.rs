//! Provider implementation for the avfallskalender.no aggregation service.
//!
//! The aggregator fronts several municipal companies behind one API. It
//! requires an API key and sits last in the discovery chain so direct
//! integrations win when both serve an address.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use hentedag_core::{
    dates::parse_iso_date,
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const BASE_URL: &str = "https://api.avfallskalender.no/v1";

/// Name of the credential the aggregator requires.
pub const API_KEY_VAR: &str = "AVFALLSKALENDER_API_KEY";

#[derive(Debug, Deserialize)]
struct AddressResponse {
    id: String,
    /// Upstream company answering for the address, e.g. “IRIS”.
    provider: String,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default)]
    days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
struct CalendarDay {
    /// ISO date of the pickup.
    date: String,
    /// Fraction label; absent for days the upstream leaves untyped.
    #[serde(default)]
    fraction: Option<String>,
}

/// Address probe backed by the aggregator's address endpoint.
pub struct AvfallskalenderAddressPort {
    client: Client,
    meta: ProviderMeta,
    api_key: Option<String>,
}

impl AvfallskalenderAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            api_key,
        }
    }
}

#[async_trait]
impl AddressProbe for AvfallskalenderAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        // Without a key the aggregator cannot take part in discovery; that
        // is a miss, not an error, so the chain keeps its other providers.
        let Some(api_key) = &self.api_key else {
            debug!("no api key configured, skipping probe");
            return Ok(None);
        };

        let number = query.house_label();
        let post_code = query.post_code.clone().unwrap_or_default();
        let response = self
            .client
            .post(format!("{BASE_URL}/address"))
            .header("x-api-key", api_key)
            .form(&[
                ("streetName", query.street.as_str()),
                ("houseNumber", number.as_str()),
                ("postCode", post_code.as_str()),
            ])
            .send()
            .await
            .map_err(PortError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let address: AddressResponse = response
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        debug!(upstream = %address.provider, id = %address.id, "address found");
        Ok(Some(ProbeMatch {
            address_id: encode_address_id(&address.provider, &address.id),
        }))
    }
}

/// Calendar implementation backed by the aggregator's calendar endpoint.
pub struct AvfallskalenderCalendarPort {
    client: Client,
    meta: ProviderMeta,
    api_key: Option<String>,
}

impl AvfallskalenderCalendarPort {
    /// Create a new calendar port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            api_key,
        }
    }
}

#[async_trait]
impl CalendarPort for AvfallskalenderCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        let Some(api_key) = &self.api_key else {
            return Err(PortError::MissingCredential(API_KEY_VAR));
        };
        let (upstream, id) =
            decode_address_id(&binding.address_id).ok_or(PortError::InvalidAddressId)?;

        // Upstreams keyed on cadastre codes take them as extra path
        // segments when the binding carries both.
        let url = match (&binding.street_code, &binding.county_id) {
            (Some(street_code), Some(county_id)) => {
                format!("{BASE_URL}/calendar/{upstream}/{id}/{street_code}/{county_id}")
            }
            _ => format!("{BASE_URL}/calendar/{upstream}/{id}"),
        };
        let response: CalendarResponse = self
            .client
            .get(url)
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        collect_calendar(response.days)
    }
}

/// Collapse calendar days into a raw calendar. Days without a fraction
/// cannot be attributed to a category and are skipped.
fn collect_calendar(days: Vec<CalendarDay>) -> Result<RawCalendar, PortError> {
    let mut calendar = RawCalendar::new();
    for day in days {
        let date = parse_iso_date(&day.date)?;
        let Some(fraction) = day.fraction else {
            debug!(date = %day.date, "untyped pickup day, skipping");
            continue;
        };
        calendar.insert_earliest(fraction, date);
    }
    Ok(calendar)
}

/// The binding stores “upstream:id” so the calendar endpoint can be
/// reconstructed without a second address lookup.
fn encode_address_id(upstream: &str, id: &str) -> String {
    format!("{upstream}:{id}")
}

fn decode_address_id(address_id: &str) -> Option<(&str, &str)> {
    let (upstream, id) = address_id.split_once(':')?;
    if upstream.is_empty() || id.is_empty() {
        return None;
    }
    Some((upstream, id))
}

/// Build the plugin bundle for the Avfallskalender provider.
///
/// `api_key` is the aggregator credential; pass `None` to register the
/// provider in a disabled state where probes miss and calendar fetches
/// report the missing credential.
#[must_use]
pub fn plugin(client: Client, api_key: Option<String>) -> ProviderPlugin {
    let probe = Arc::new(AvfallskalenderAddressPort::new(
        client.clone(),
        api_key.clone(),
    ));
    let calendar = Arc::new(AvfallskalenderCalendarPort::new(client, api_key));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Avfallskalender)
}
