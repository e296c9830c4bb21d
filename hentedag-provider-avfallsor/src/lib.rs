//! Provider implementation for Avfall Sør in the Kristiansand region.
//!
//! The address API returns links into the website; the pickup days are
//! scraped from the linked page's day headings.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;

use hentedag_core::{
    dates::{date_in_closest_year, month_number},
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const ADDRESS_URL: &str = "https://avfallsor.no/wp-json/addresses/v1/address";
const PICKUP_URL: &str = "https://avfallsor.no/henting-av-avfall/finn-hentedag";

/// Fractions listed as one phrase that the label table knows as a whole.
const COMBINED_LABELS: [&str; 2] = [
    "Glass- og metallemballasje",
    "Papp, papir og plastemballasje",
];

#[derive(Debug, Deserialize)]
struct AddressHit {
    #[serde(default)]
    href: String,
}

/// Address probe backed by the WordPress address API.
pub struct AvfallSorAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl AvfallSorAddressPort {
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
impl AddressProbe for AvfallSorAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        // The endpoint answers with an object keyed by address variant, each
        // value linking to the pickup-day page for that variant.
        let hits: BTreeMap<String, AddressHit> = self
            .client
            .get(ADDRESS_URL)
            .query(&[("address", query.full_address())])
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        let Some(address_id) = hits.values().find_map(|hit| id_from_href(&hit.href)) else {
            return Ok(None);
        };
        debug!(id = %address_id, "address found");
        Ok(Some(ProbeMatch { address_id }))
    }
}

/// Extract the pickup-day page id from an address link.
fn id_from_href(href: &str) -> Option<String> {
    let (_, tail) = href.split_once("finn-hentedag/")?;
    let id = tail.split('/').next().unwrap_or_default();
    if id.is_empty() {
        return None;
    }
    Some(id.to_owned())
}

/// Calendar implementation scraping the pickup-day page.
pub struct AvfallSorCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl AvfallSorCalendarPort {
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
impl CalendarPort for AvfallSorCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let body = self
            .client
            .get(format!("{PICKUP_URL}/{}/", binding.address_id))
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

/// Scrape the day headings and their fraction boxes from a pickup page.
///
/// Headings read like “Mandag 5. august”; the info boxes that follow each
/// heading name the fractions collected that day. Days that already passed
/// are dropped.
fn parse_calendar(body: &str, today: NaiveDate) -> Result<RawCalendar, PortError> {
    let document = Html::parse_document(body);

    let heading_selector = selector(".pickup-days-small h3")?;
    let box_selector = selector(".info-boxes-box div")?;

    let mut calendar = RawCalendar::new();
    for heading in document.select(&heading_selector) {
        let heading_text = heading.text().collect::<String>();
        let date = match parse_day_heading(&heading_text, today) {
            Ok(date) => date,
            Err(PortError::Malformed(reason)) => {
                debug!(reason, "heading without parseable date, skipping");
                continue;
            }
            Err(error) => return Err(error),
        };
        if date < today {
            continue;
        }

        let Some(boxes) = heading.next_siblings().find_map(ElementRef::wrap) else {
            continue;
        };
        for fraction_div in boxes.select(&box_selector) {
            let label = collapsed_text(&fraction_div);
            if label.is_empty() {
                continue;
            }
            insert_labels(&mut calendar, &label, date);
        }
    }
    Ok(calendar)
}

/// Parse a heading such as “Mandag 5. august” into the year closest to
/// `today`.
fn parse_day_heading(text: &str, today: NaiveDate) -> Result<NaiveDate, PortError> {
    let mut tokens = text
        .split_whitespace()
        .skip_while(|token| !token.starts_with(|character: char| character.is_ascii_digit()));
    let day: u32 = tokens
        .next()
        .map(|token| token.trim_end_matches('.'))
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| PortError::Malformed(format!("no day in heading: {text}")))?;
    let month = tokens
        .next()
        .map(month_number)
        .transpose()?
        .ok_or_else(|| PortError::Malformed(format!("no month in heading: {text}")))?;
    date_in_closest_year(day, month, today)
        .ok_or_else(|| PortError::Malformed(format!("impossible date in heading: {text}")))
}

/// Record a fraction text, either as one known combined phrase or word by
/// word so “Restavfall og matavfall:” feeds both categories.
fn insert_labels(calendar: &mut RawCalendar, label: &str, date: NaiveDate) {
    if let Some(combined) = COMBINED_LABELS
        .iter()
        .find(|combined| combined.eq_ignore_ascii_case(label))
    {
        calendar.insert_earliest(*combined, date);
        return;
    }
    for word in label.split_whitespace() {
        let cleaned = word.trim_matches(|character: char| character == ':' || character == ',');
        if cleaned.is_empty() {
            continue;
        }
        calendar.insert_earliest(capitalize(cleaned), date);
    }
}

/// Element text with runs of whitespace collapsed to single spaces.
fn collapsed_text(element: &ElementRef<'_>) -> String {
    let text = element.text().collect::<String>();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(word: &str) -> String {
    let mut characters = word.chars();
    match characters.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), characters.as_str()),
        None => String::new(),
    }
}

fn selector(css: &str) -> Result<Selector, PortError> {
    Selector::parse(css)
        .map_err(|error| PortError::Malformed(format!("invalid selector {css}: {error}")))
}

/// Build the plugin bundle for the Avfall Sør provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(AvfallSorAddressPort::new(client.clone()));
    let calendar = Arc::new(AvfallSorCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::AvfallSor)
}
