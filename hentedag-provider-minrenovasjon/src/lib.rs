//! Provider implementation for municipalities on Norkart's Min Renovasjon API.

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

const BASE_URL: &str = "https://komteksky.norkart.no/komtek.renovasjonwebapi/api";

/// Application key the public Min Renovasjon app ships with.
const APP_KEY: &str = "AE13DEEC-804F-4615-A74E-B4FAC11F0A30";

/// One fraction with its scheduled pickup dates, from /tommekalender.
#[derive(Debug, Deserialize)]
struct FractionEntry {
    #[serde(rename = "FraksjonId")]
    fraction_id: i64,

    #[serde(rename = "Tommedatoer", default)]
    pickup_dates: Vec<String>, // ISO timestamps
}

/// Address probe backed by the Komtek calendar endpoint: an address is
/// served when the calendar request returns at least one fraction.
pub struct MinRenovasjonAddressPort {
    client: Client,
    meta: ProviderMeta,
}

impl MinRenovasjonAddressPort {
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
impl AddressProbe for MinRenovasjonAddressPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn probe(&self, query: &AddressQuery) -> Result<Option<ProbeMatch>, PortError> {
        // The Komtek API is keyed on cadastre codes. Without them this
        // provider cannot answer, which is a miss rather than an error.
        let (Some(county_id), Some(street_code)) = (&query.county_id, &query.street_code) else {
            debug!("no cadastre codes available, skipping probe");
            return Ok(None);
        };

        let request = calendar_request(
            &self.client,
            county_id,
            &query.street,
            street_code,
            &query.house_label(),
        );
        let entries = fetch_json::<Vec<FractionEntry>>(request).await?;
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(ProbeMatch {
            address_id: query.full_address(),
        }))
    }
}

/// Calendar implementation backed by the Komtek calendar endpoint.
pub struct MinRenovasjonCalendarPort {
    client: Client,
    meta: ProviderMeta,
}

impl MinRenovasjonCalendarPort {
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
impl CalendarPort for MinRenovasjonCalendarPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn calendar(&self, binding: &AddressBinding) -> Result<RawCalendar, PortError> {
        let (Some(county_id), Some(street_code)) = (&binding.county_id, &binding.street_code)
        else {
            return Err(PortError::InvalidAddressId);
        };
        let query =
            AddressQuery::parse(&binding.raw_address).ok_or(PortError::InvalidAddressId)?;

        let request = calendar_request(
            &self.client,
            county_id,
            &query.street,
            street_code,
            &query.house_label(),
        );
        let entries = fetch_json::<Vec<FractionEntry>>(request).await?;
        collect_calendar(entries)
    }
}

/// Collapse fraction entries into a raw calendar keyed by fraction code.
fn collect_calendar(entries: Vec<FractionEntry>) -> Result<RawCalendar, PortError> {
    let mut calendar = RawCalendar::new();
    for entry in entries {
        let label = entry.fraction_id.to_string();
        for value in &entry.pickup_dates {
            let date = parse_iso_date(value)?;
            calendar.insert_earliest(label.clone(), date);
        }
    }
    Ok(calendar)
}

fn calendar_request(
    client: &Client,
    county_id: &str,
    street: &str,
    street_code: &str,
    house_number: &str,
) -> RequestBuilder {
    client
        .get(format!("{BASE_URL}/tommekalender/"))
        .header("RenovasjonAppKey", APP_KEY)
        .header("Kommunenr", county_id)
        .query(&[
            ("kommunenr", county_id),
            ("gatenavn", street),
            ("gatekode", street_code),
            ("husnr", house_number),
        ])
}

/// Build the plugin bundle for the Min Renovasjon provider.
#[must_use]
pub fn plugin(client: Client) -> ProviderPlugin {
    let probe = Arc::new(MinRenovasjonAddressPort::new(client.clone()));
    let calendar = Arc::new(MinRenovasjonCalendarPort::new(client));

    ProviderPlugin {
        meta: provider_meta(),
        probe,
        calendar,
    }
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta::new(ProviderId::MinRenovasjon)
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

    use super::{collect_calendar, FractionEntry};

    const CALENDAR_FIXTURE: &str = r#"[
        {
            "FraksjonId": 1,
            "Tommedatoer": ["2024-06-12T00:00:00", "2024-06-26T00:00:00"]
        },
        {
            "FraksjonId": 2,
            "Tommedatoer": ["2024-06-20T00:00:00"]
        },
        {
            "FraksjonId": 7,
            "Tommedatoer": []
        }
    ]"#;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn collects_earliest_date_per_fraction_code() {
        let entries: Vec<FractionEntry> =
            serde_json::from_str(CALENDAR_FIXTURE).expect("fixture should deserialize");
        let calendar = collect_calendar(entries).expect("calendar");

        assert_eq!(calendar.get("1"), Some(date(2024, 6, 12)));
        assert_eq!(calendar.get("2"), Some(date(2024, 6, 20)));
        assert_eq!(calendar.get("7"), None);
        assert_eq!(calendar.len(), 2);
    }

    #[test]
    fn invalid_date_in_calendar_is_an_error() {
        let entries: Vec<FractionEntry> = serde_json::from_str(
            r#"[{"FraksjonId": 1, "Tommedatoer": ["12.06.2024"]}]"#,
        )
        .expect("fixture should deserialize");
        assert!(collect_calendar(entries).is_err());
    }
}
