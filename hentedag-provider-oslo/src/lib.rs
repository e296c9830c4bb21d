//! Provider implementation for Oslo municipality's REN pickup service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use hentedag_core::{
    dates::parse_day_month_numeric,
    model::{AddressBinding, AddressQuery, ProviderId, ProviderMeta, RawCalendar},
    plugin::ProviderPlugin,
    ports::{AddressProbe, CalendarPort, PortError, ProbeMatch},
};

const BASE_URL: &str = "https://www.oslo.kommune.no/xmlhttprequest.php";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "HentePunkts", default)]
    pickup_points: Vec<PickupPoint>,
}

#[derive(Debug, Deserialize)]
struct PickupPoint {
    #[serde(rename = "Tjenester", default)]
    services: Vec<PickupService>,
}

/// One collection service at a pickup point.
#[derive(Debug, Deserialize)]
struct PickupService {
    #[serde(rename = "Fraksjon")]
    fraction: FractionText,

    /// Next pickup as a day.month fragment, e.g. “05.07.”.
    #[serde(rename = "TommeDato")]
    pickup_date: String,

    /// Collection cadence, e.g. “Hver 2. uke”.
    #[serde(rename = "Hyppighet", default)]
    frequency: Option<FrequencyText>,
}

#[derive(Debug, Deserialize)]
struct FractionText {
    #[serde(rename = "Tekst")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct FrequencyText {
    #[serde(rename = "Tekst")]
    text: String,
}

/// Address probe backed by the ren.search endpoint.
pub struct OsloAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl OsloAddressPort {
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
impl AddressProbe for OsloAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        let services = fetch_services(&self.client, query).await?;
        if services.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProbeMatch {
            address_id: query.full_address(),
        }))
    }
}

/// Calendar implementation backed by the ren.search endpoint.
pub struct OsloCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl OsloCalendarPort {
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
impl CalendarPort for OsloCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        let mut query =
            AddressQuery::parse(&binding.raw_address).ok_or(PortError::InvalidAddressId)?;
        query.street_code.clone_from(&binding.street_code);

        let services = fetch_services(&self.client, &query).await?;
        collect_calendar(services, Local::now().date_naive())
    }
}

/// Run the ren.search query and flatten the first pickup point's services.
async fn fetch_services(
    client: &Client,
    query: &AddressQuery,
) -> Result<Vec<PickupService>, PortError> {
    let letter = query
        .letter
        .map(|letter| letter.to_string())
        .unwrap_or_default();
    let street_code = query.street_code.clone().unwrap_or_default();
    let number = query.house_number.to_string();

    let request = client.get(BASE_URL).query(&[
        ("service", "ren.search"),
        ("street", query.street.as_str()),
        ("number", number.as_str()),
        ("letter", letter.as_str()),
        ("street_id", street_code.as_str()),
    ]);
    let envelope = fetch_json::<SearchEnvelope>(request).await?;

    let services = envelope
        .data
        .result
        .into_iter()
        .next()
        .and_then(|result| result.pickup_points.into_iter().next())
        .map(|point| point.services)
        .unwrap_or_default();
    Ok(services)
}

/// Build the raw calendar from REN services.
///
/// Dates come without a year and are placed in the year closest to today.
/// A date that recently passed is rolled forward by the service's week
/// cadence when one is given, otherwise the service is skipped. The residual date also
/// stands in for plastic and food waste, which Oslo collects in the same
/// bin with optical sorting.
fn collect_calendar(
    services: Vec<PickupService>,
    today: NaiveDate,
) -> Result<RawCalendar, PortError> {
    let mut calendar = RawCalendar::new();
    for service in services {
        let date = match parse_day_month_numeric(&service.pickup_date, today) {
            Ok(date) => date,
            Err(PortError::Malformed(reason)) => {
                debug!(reason, "skipping service with unparseable date");
                continue;
            }
            Err(error) => return Err(error),
        };

        if date >= today {
            calendar.insert_earliest(service.fraction.text, date);
            continue;
        }

        let cadence = service
            .frequency
            .as_ref()
            .and_then(|frequency| week_interval(&frequency.text));
        let Some(weeks) = cadence else {
            debug!(
                fraction = %service.fraction.text,
                "past date without cadence, skipping"
            );
            continue;
        };
        let mut next = date;
        while next < today {
            next += Duration::days(weeks * 7);
        }
        calendar.insert_earliest(service.fraction.text, next);
    }

    if let Some(residual) = calendar.get("Restavfall") {
        calendar.insert_earliest("Plast", residual);
        calendar.insert_earliest("Mat", residual);
    }
    Ok(calendar)
}

/// Extract the week count from a cadence text such as “Hver 2. uke”.
/// “Hver uke” counts as one week. Returns `None` for non-weekly cadences.
fn week_interval(text: &str) -> Option<i64> {
    let lowered = text.to_lowercase();
    if !lowered.contains("uke") {
        return None;
    }
    let digits: String = lowered
        .chars()
        .skip_while(|character| !character.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    let weeks = digits.parse().unwrap_or(1);
    (weeks >= 1).then_some(weeks)
}

/// Build the plugin bundle for the Oslo provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(OsloAddressPort::new(client.clone()));
    let calendar = Arc::new(OsloCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::Oslo)
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

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{collect_calendar, week_interval, PickupService, SearchEnvelope};

    const SEARCH_FIXTURE: &str = r#"{
        "data": {
            "result": [
                {
                    "HentePunkts": [
                        {
                            "Tjenester": [
                                {
                                    "Fraksjon": { "Tekst": "Restavfall" },
                                    "TommeDato": "12.06.",
                                    "Hyppighet": { "Tekst": "Hver uke" }
                                },
                                {
                                    "Fraksjon": { "Tekst": "Papir" },
                                    "TommeDato": "03.06.",
                                    "Hyppighet": { "Tekst": "Hver 2. uke" }
                                },
                                {
                                    "Fraksjon": { "Tekst": "Juletrær" },
                                    "TommeDato": "02.01.",
                                    "Hyppighet": { "Tekst": "En gang i året" }
                                }
                            ]
                        }
                    ]
                }
            ]
        }
    }"#;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn fixture_services() -> Vec<PickupService> {
        let envelope: SearchEnvelope =
            serde_json::from_str(SEARCH_FIXTURE).expect("fixture should deserialize");
        envelope
            .data
            .result
            .into_iter()
            .next()
            .and_then(|result| result.pickup_points.into_iter().next())
            .map(|point| point.services)
            .expect("fixture services")
    }

    #[test]
    fn upcoming_dates_are_kept_and_residual_covers_plastic_and_food() {
        let today = date(2024, 6, 9);
        let calendar = collect_calendar(fixture_services(), today).expect("calendar");

        assert_eq!(calendar.get("Restavfall"), Some(date(2024, 6, 12)));
        assert_eq!(calendar.get("Plast"), Some(date(2024, 6, 12)));
        assert_eq!(calendar.get("Mat"), Some(date(2024, 6, 12)));
    }

    #[test]
    fn past_dates_roll_forward_by_the_week_cadence() {
        let today = date(2024, 6, 9);
        let calendar = collect_calendar(fixture_services(), today).expect("calendar");

        // 03.06 + 2 weeks lands on 17.06, the first cadence step not in the past.
        assert_eq!(calendar.get("Papir"), Some(date(2024, 6, 17)));
    }

    #[test]
    fn past_dates_without_weekly_cadence_are_skipped() {
        let today = date(2024, 6, 9);
        let calendar = collect_calendar(fixture_services(), today).expect("calendar");

        assert_eq!(calendar.get("Juletrær"), None);
    }

    #[test]
    fn week_interval_reads_cadence_texts() {
        assert_eq!(week_interval("Hver 2. uke"), Some(2));
        assert_eq!(week_interval("Hver uke"), Some(1));
        assert_eq!(week_interval("hver 4. uke"), Some(4));
        assert_eq!(week_interval("En gang i måneden"), None);
    }
}
