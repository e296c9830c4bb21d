//! Provider implementation for Innherred Renovasjon.
//!
//! Address lookup goes through the site's WordPress JSON API; the plan
//! itself is only available as a rendered HTML page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use hentedag_core::{
    dates::parse_day_month,
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const ADDRESS_URL: &str = "https://innherredrenovasjon.no/wp-json/ir/v1/addresses";
const PLAN_URL: &str = "https://innherredrenovasjon.no/tommeplan";

/// Combined fraction Innherred reports for glass and metal packaging.
const GLASS_METAL_COMBINED: &str = "Glass- og metallemballasje";

#[derive(Debug, Deserialize)]
struct AddressEnvelope {
    data: AddressData,
}

#[derive(Debug, Deserialize)]
struct AddressData {
    #[serde(default)]
    results: Vec<AddressResult>,
}

#[derive(Debug, Deserialize)]
struct AddressResult {
    id: String,
}

/// Address probe backed by the WordPress address API.
pub struct InnherredAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl InnherredAddressPort {
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
impl AddressProbe for InnherredAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let envelope: AddressEnvelope = self
            .client
            .get(format!("{ADDRESS_URL}/{}", query.full_address()))
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        let Some(result) = envelope.data.results.into_iter().next() else {
            return Ok(None);
        };
        debug!(id = %result.id, "address found");
        Ok(Some(ProbeMatch {
            address_id: result.id,
        }))
    }
}

/// Calendar implementation scraping the rendered plan page.
pub struct InnherredCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl InnherredCalendarPort {
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
impl CalendarPort for InnherredCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let body = self
            .client
            .get(format!("{PLAN_URL}/{}/", binding.address_id))
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .text()
            .await
            .map_err(PortError::from)?;

        parse_calendar(&body, Local::now().date_naive())
    }
}

/// Scrape the fraction blocks from a plan page.
fn parse_calendar(body: &str, today: NaiveDate) -> Result<RawCalendar, PortError> {
    let document = Html::parse_document(body);

    let error_selector = selector("section.garbage-disposal.gd-error")?;
    if document.select(&error_selector).next().is_some() {
        return Err(PortError::AddressNotFound);
    }

    let fraction_selector = selector(".gd__fraction")?;
    let name_selector = selector(".gd__fraction-name")?;
    let date_selector = selector(".gd__next-date")?;

    let mut calendar = RawCalendar::new();
    for block in document.select(&fraction_selector) {
        let Some(name_element) = block.select(&name_selector).next() else {
            continue;
        };
        let name = name_element.text().collect::<String>().trim().to_owned();
        if name.is_empty() {
            continue;
        }

        let fragment = block
            .select(&date_selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .unwrap_or_default();
        let date = match parse_day_month(fragment.trim(), today) {
            Ok(date) => date,
            Err(PortError::Malformed(reason)) => {
                debug!(name, reason, "fraction without parseable date, skipping");
                continue;
            }
            Err(error) => return Err(error),
        };

        if name == GLASS_METAL_COMBINED {
            calendar.insert_earliest("Glass", date);
            calendar.insert_earliest("Metall", date);
        } else {
            calendar.insert_earliest(name, date);
        }
    }
    Ok(calendar)
}

fn selector(css: &str) -> Result<Selector, PortError> {
    Selector::parse(css)
        .map_err(|error| PortError::Malformed(format!("invalid selector {css}: {error}")))
}

/// Build the plugin bundle for the Innherred Renovasjon provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(InnherredAddressPort::new(client.clone()));
    let calendar = Arc::new(InnherredCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Innherred)
}
