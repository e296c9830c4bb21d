//! Provider implementation for Stavanger municipality.
//!
//! The address search is a JSON endpoint; the calendar is scraped from the
//! month tables the site renders.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use hentedag_core::{
    dates::parse_day_month_numeric,
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const SEARCH_URL: &str =
    "https://www.stavanger.kommune.no/api/renovasjonservice/AddressSearch";
const CALENDAR_URL: &str =
    "https://www.stavanger.kommune.no/renovasjon-og-miljo/tommekalender/finn-kalender/show";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "Result", default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

/// Address probe backed by the renovasjonservice search endpoint.
pub struct StavangerAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl StavangerAddressPort {
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
impl AddressProbe for StavangerAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let envelope: SearchEnvelope = self
            .client
            .get(SEARCH_URL)
            .query(&[("address", query.full_address())])
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        let Some(hit) = envelope.result.into_iter().next() else {
            return Ok(None);
        };
        debug!(id = %hit.id, "address found");
        Ok(Some(ProbeMatch { address_id: hit.id }))
    }
}

/// Calendar implementation scraping the rendered month tables.
pub struct StavangerCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl StavangerCalendarPort {
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
impl CalendarPort for StavangerCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let body = self
            .client
            .get(CALENDAR_URL)
            .query(&[("id", binding.address_id.as_str())])
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

/// Scrape the month tables of a Stavanger calendar page.
///
/// Each row holds a numeric day.month in its first cell and one icon per
/// collected fraction; icon titles are the labels. The page keeps whole
/// months visible, so rows whose date already passed are dropped here;
/// otherwise a stale row would win the earliest-date slot for its label.
fn parse_calendar(body: &str, today: NaiveDate) -> Result<RawCalendar, PortError> {
    let document = Html::parse_document(body);

    let table_selector = selector(".waste-calendar.js-waste-calendar tbody")?;
    let row_selector = selector(".waste-calendar__item")?;
    let cell_selector = selector("td")?;
    let icon_selector = selector("img")?;

    let mut calendar = RawCalendar::new();
    for table in document.select(&table_selector) {
        for row in table.select(&row_selector) {
            let date_text = row
                .select(&cell_selector)
                .next()
                .map(|cell| cell.text().collect::<String>())
                .unwrap_or_default();
            let date = match parse_day_month_numeric(date_text.trim(), today) {
                Ok(date) => date,
                Err(PortError::Malformed(reason)) => {
                    debug!(reason, "row without parseable date, skipping");
                    continue;
                }
                Err(error) => return Err(error),
            };
            if date < today {
                continue;
            }

            for icon in row.select(&icon_selector) {
                let Some(title) = icon.value().attr("title") else {
                    continue;
                };
                // Icon titles read “Papp/papir”; the short form matches the
                // shared label table.
                let label = title.trim().replace("/papir", "");
                if !label.is_empty() {
                    calendar.insert_earliest(label, date);
                }
            }
        }
    }
    Ok(calendar)
}

fn selector(css: &str) -> Result<Selector, PortError> {
    Selector::parse(css)
        .map_err(|error| PortError::Malformed(format!("invalid selector {css}: {error}")))
}

/// Build the plugin bundle for the Stavanger provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(StavangerAddressPort::new(client.clone()));
    let calendar = Arc::new(StavangerCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Stavanger)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::parse_calendar;

    const CALENDAR_FIXTURE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <table class="waste-calendar js-waste-calendar">
      <tbody>
        <tr class="waste-calendar__item">
          <td>02.04</td>
          <td><img title="Restavfall" src="rest.svg"></td>
        </tr>
        <tr class="waste-calendar__item">
          <td>09.04</td>
          <td>
            <img title="Papp/papir" src="papir.svg">
            <img title="Matavfall" src="mat.svg">
          </td>
        </tr>
      </tbody>
    </table>
    <table class="waste-calendar js-waste-calendar">
      <tbody>
        <tr class="waste-calendar__item">
          <td>07.05</td>
          <td><img title="Restavfall" src="rest.svg"></td>
        </tr>
      </tbody>
    </table>
  </body>
</html>"#;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn scrapes_rows_across_month_tables() {
        let calendar = parse_calendar(CALENDAR_FIXTURE, date(2024, 4, 1)).expect("calendar");

        assert_eq!(calendar.get("Restavfall"), Some(date(2024, 4, 2)));
        assert_eq!(calendar.get("Matavfall"), Some(date(2024, 4, 9)));
    }

    #[test]
    fn strips_papir_suffix_from_combined_icon_titles() {
        let calendar = parse_calendar(CALENDAR_FIXTURE, date(2024, 4, 1)).expect("calendar");

        assert_eq!(calendar.get("Papp"), Some(date(2024, 4, 9)));
        assert_eq!(calendar.get("Papp/papir"), None);
    }

    #[test]
    fn past_rows_cannot_shadow_an_upcoming_pickup() {
        let calendar = parse_calendar(CALENDAR_FIXTURE, date(2024, 4, 20)).expect("calendar");
        // The 02.04 row already passed; only the 07.05 one counts for
        // Restavfall, and the passed 09.04 fractions disappear entirely.
        assert_eq!(calendar.get("Restavfall"), Some(date(2024, 5, 7)));
        assert_eq!(calendar.get("Matavfall"), None);
        assert_eq!(calendar.get("Papp"), None);
    }
}
