//! Provider implementation for BIR in the Bergen region.
//!
//! BIR has no calendar API; the schedule is scraped from the address page
//! the website renders for a resolved address id.

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

const SEARCH_URL: &str = "https://bir.no/api/search/AddressSearch";
const ADDRESS_PAGE_URL: &str = "https://bir.no/adressesoek/";

/// Title of the error page BIR serves for unknown or stale address ids.
const ERROR_PAGE_TITLE: &str = "En feil har oppstått";

/// Combined fraction BIR reports for paper and plastic packaging.
const PAPER_PLASTIC_COMBINED: &str = "Papir og plastemballasje";

#[derive(Debug, Deserialize)]
struct AddressHit {
    #[serde(rename = "Id")]
    id: String,
}

/// Address probe backed by BIR's address search API.
pub struct BirAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl BirAddressPort {
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
impl AddressProbe for BirAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let hits: Vec<AddressHit> = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query.full_address())])
            .send()
            .await
            .map_err(PortError::from)?
            .error_for_status()
            .map_err(PortError::from)?
            .json()
            .await
            .map_err(PortError::from)?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        debug!(id = %hit.id, "address found");
        Ok(Some(ProbeMatch { address_id: hit.id }))
    }
}

/// Calendar implementation scraping BIR's address page.
pub struct BirCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl BirCalendarPort {
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
impl CalendarPort for BirCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        if binding.address_id.trim().is_empty() {
            return Err(PortError::InvalidAddressId);
        }
        let body = self
            .client
            .get(ADDRESS_PAGE_URL)
            .query(&[
                ("rId", binding.address_id.as_str()),
                ("name", binding.raw_address.as_str()),
            ])
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

/// Scrape the pickup list from a BIR address page.
///
/// Rows with a date that already passed are dropped; the page keeps the
/// current week's history visible.
fn parse_calendar(body: &str, today: NaiveDate) -> Result<RawCalendar, PortError> {
    let document = Html::parse_document(body);

    let title_selector = selector("title")?;
    if let Some(title) = document.select(&title_selector).next() {
        let text: String = title.text().collect();
        if text.trim().starts_with(ERROR_PAGE_TITLE) {
            return Err(PortError::AddressNotFound);
        }
    }

    let row_selector = selector("ul.address-page-box__list li")?;
    let label_selector = selector(".text-content__inner")?;
    let day_selector = selector(".date__day")?;
    let month_selector = selector(".date__month")?;

    let mut calendar = RawCalendar::new();
    for row in document.select(&row_selector) {
        let Some(label_element) = row.select(&label_selector).next() else {
            continue;
        };
        let label = direct_text(&label_element);
        if label.is_empty() {
            continue;
        }

        let day_text = row
            .select(&day_selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .unwrap_or_default();
        let month_text = row
            .select(&month_selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .unwrap_or_default();

        let Ok(day) = day_text.trim().trim_end_matches('.').parse::<u32>() else {
            debug!(label, "row without a day number, skipping");
            continue;
        };
        let month = month_number(month_text.trim())?;
        let Some(date) = date_in_closest_year(day, month, today) else {
            debug!(label, day, month, "impossible date on page, skipping");
            continue;
        };
        if date < today {
            continue;
        }

        if label == PAPER_PLASTIC_COMBINED {
            calendar.insert_earliest("Papp", date);
            calendar.insert_earliest("Plast", date);
        } else {
            calendar.insert_earliest(label, date);
        }
    }
    Ok(calendar)
}

/// First non-empty text node directly under the element, skipping text
/// nested in child elements.
fn direct_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_owned()
}

fn selector(css: &str) -> Result<Selector, PortError> {
    Selector::parse(css)
        .map_err(|error| PortError::Malformed(format!("invalid selector {css}: {error}")))
}

/// Build the plugin bundle for the BIR provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(BirAddressPort::new(client.clone()));
    let calendar = Arc::new(BirCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Bir)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::parse_calendar;
    use hentedag_core::ports::PortError;

    const PAGE_FIXTURE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Bjørnavegen 72 - BIR</title></head>
  <body>
    <ul class="address-page-box__list">
      <li>
        <div class="date"><span class="date__day">4.</span><span class="date__month">apr</span></div>
        <div class="text-content__inner">Restavfall<span class="hidden">ekstra</span></div>
      </li>
      <li>
        <div class="date"><span class="date__day">11.</span><span class="date__month">apr</span></div>
        <div class="text-content__inner">Papir og plastemballasje</div>
      </li>
      <li>
        <div class="date"><span class="date__day">1.</span><span class="date__month">apr</span></div>
        <div class="text-content__inner">Matavfall</div>
      </li>
    </ul>
  </body>
</html>"#;

    const ERROR_FIXTURE: &str = r"<!DOCTYPE html>
<html>
  <head><title>En feil har oppstått - BIR</title></head>
  <body><p>Noe gikk galt.</p></body>
</html>";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn scrapes_rows_and_splits_combined_labels() {
        let today = date(2024, 4, 2);
        let calendar = parse_calendar(PAGE_FIXTURE, today).expect("calendar");

        assert_eq!(calendar.get("Restavfall"), Some(date(2024, 4, 4)));
        assert_eq!(calendar.get("Papp"), Some(date(2024, 4, 11)));
        assert_eq!(calendar.get("Plast"), Some(date(2024, 4, 11)));
    }

    #[test]
    fn drops_rows_with_past_dates() {
        let today = date(2024, 4, 2);
        let calendar = parse_calendar(PAGE_FIXTURE, today).expect("calendar");
        // The 1. apr food waste row predates today.
        assert_eq!(calendar.get("Matavfall"), None);
    }

    #[test]
    fn error_page_maps_to_address_not_found() {
        let today = date(2024, 4, 2);
        let error = parse_calendar(ERROR_FIXTURE, today).expect_err("should fail");
        assert!(matches!(error, PortError::AddressNotFound));
    }

    #[test]
    fn january_rows_scraped_in_december_land_in_the_next_year() {
        let body = r#"<html><head><title>ok</title></head><body>
          <ul class="address-page-box__list"><li>
            <div class="date"><span class="date__day">4.</span><span class="date__month">jan</span></div>
            <div class="text-content__inner">Restavfall</div>
          </li></ul></body></html>"#;
        let calendar = parse_calendar(body, date(2024, 12, 20)).expect("calendar");
        assert_eq!(calendar.get("Restavfall"), Some(date(2025, 1, 4)));
    }

    #[test]
    fn unknown_month_name_is_a_hard_error() {
        let body = r#"<html><head><title>ok</title></head><body>
          <ul class="address-page-box__list"><li>
            <span class="date__day">4.</span><span class="date__month">xyz</span>
            <div class="text-content__inner">Restavfall</div>
          </li></ul></body></html>"#;
        let error = parse_calendar(body, date(2024, 4, 2)).expect_err("should fail");
        assert!(matches!(error, PortError::UnknownMonth(_)));
    }
}
