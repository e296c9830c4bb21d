//! Domain data structures for waste categories, addresses, and pickups.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Canonical waste categories every provider vocabulary collapses into.
///
/// The declaration order is the canonical ordering used for tie-sets and
/// display strings.
pub enum WasteCategory {
    /// Residual household waste ("restavfall").
    General,
    /// Paper and cardboard ("papp/papir").
    Paper,
    /// Plastic packaging ("plastemballasje").
    Plastic,
    /// Food and organic waste ("matavfall").
    Bio,
    /// Glass and metal packaging ("glass/metall").
    GlassMetal,
}

impl WasteCategory {
    /// All categories in canonical order.
    pub const ALL: [WasteCategory; 5] = [
        WasteCategory::General,
        WasteCategory::Paper,
        WasteCategory::Plastic,
        WasteCategory::Bio,
        WasteCategory::GlassMetal,
    ];

    /// Short Norwegian label used in joined display strings.
    #[must_use]
    pub fn short_label(self) -> &'static str {
        match self {
            WasteCategory::General => "Rest",
            WasteCategory::Paper => "Papp",
            WasteCategory::Plastic => "Plast",
            WasteCategory::Bio => "Mat",
            WasteCategory::GlassMetal => "Glass/Metall",
        }
    }

    /// Long Norwegian label used for sensor captions.
    #[must_use]
    pub fn long_label(self) -> &'static str {
        match self {
            WasteCategory::General => "Restavfall",
            WasteCategory::Paper => "Papp/papir",
            WasteCategory::Plastic => "Plastavfall",
            WasteCategory::Bio => "Matavfall",
            WasteCategory::GlassMetal => "Glass/metall",
        }
    }

    /// Stable identifier suffix used for per-category capabilities.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            WasteCategory::General => "general",
            WasteCategory::Paper => "paper",
            WasteCategory::Plastic => "plastic",
            WasteCategory::Bio => "bio",
            WasteCategory::GlassMetal => "glassmetal",
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.short_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Waste collection providers known to hentedag.
pub enum ProviderId {
    /// Norkart Min Renovasjon, covering most municipalities on Komtek.
    MinRenovasjon,
    /// ReMidt IKS (Trøndelag and Nordmøre).
    ReMidt,
    /// Glør IKS (Lillehammer region).
    Glor,
    /// Stavanger municipality.
    Stavanger,
    /// BIR (Bergen region).
    Bir,
    /// Innherred Renovasjon.
    Innherred,
    /// Oslo municipality (REN).
    Oslo,
    /// Avfall Sør (Kristiansand region).
    AvfallSor,
    /// Avfallskalender.no aggregation service.
    Avfallskalender,
}

impl ProviderId {
    /// Human-friendly provider name, as shown during pairing.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ProviderId::MinRenovasjon => "Min Renovasjon",
            ProviderId::ReMidt => "ReMidt",
            ProviderId::Glor => "Glør",
            ProviderId::Stavanger => "Stavanger kommune",
            ProviderId::Bir => "BIR",
            ProviderId::Innherred => "Innherred Renovasjon",
            ProviderId::Oslo => "Oslo kommune",
            ProviderId::AvfallSor => "Avfall Sør",
            ProviderId::Avfallskalender => "Avfallskalender",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a provider and its human-friendly name.
pub struct ProviderMeta {
    /// Unique identifier.
    pub id: ProviderId,
    /// Display name.
    pub name: String,
}

impl ProviderMeta {
    /// Build metadata with the provider's default display name.
    #[must_use]
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            name: id.name().to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
/// Free-text street address split into the parts provider endpoints expect.
pub struct AddressQuery {
    /// Street name, possibly multiple words.
    pub street: String,
    /// Numeric part of the house number.
    pub house_number: u32,
    /// Optional house letter such as the “B” in “72B”.
    pub letter: Option<char>,
    /// Optional four-digit postal code given after the house number.
    pub post_code: Option<String>,
    /// Municipality number from the cadastre, when resolved.
    pub county_id: Option<String>,
    /// Street code from the cadastre, when resolved.
    pub street_code: Option<String>,
}

impl AddressQuery {
    /// Split a free-text address such as “Bjørnavegen 72B” or
    /// “Markveien 35B, 0554” into street, house number, and postal code.
    ///
    /// Returns `None` when no house number can be located.
    #[must_use]
    pub fn parse(address: &str) -> Option<Self> {
        let mut street_words: Vec<&str> = Vec::new();
        let mut house: Option<(u32, Option<char>)> = None;
        let mut post_code: Option<String> = None;

        for token in address.split_whitespace() {
            let word = token.trim_matches(',');
            if word.is_empty() {
                continue;
            }
            if house.is_none() {
                if let Some(parsed) = parse_house_number(word) {
                    house = Some(parsed);
                } else {
                    street_words.push(word);
                }
            } else if post_code.is_none() && word.len() == 4 && word.bytes().all(|byte| byte.is_ascii_digit()) {
                post_code = Some(word.to_owned());
            }
        }

        let (house_number, letter) = house?;
        if street_words.is_empty() {
            return None;
        }
        Some(Self {
            street: street_words.join(" "),
            house_number,
            letter,
            post_code,
            county_id: None,
            street_code: None,
        })
    }

    /// House number with its letter attached, e.g. “72B”.
    #[must_use]
    pub fn house_label(&self) -> String {
        match self.letter {
            Some(letter) => format!("{}{letter}", self.house_number),
            None => self.house_number.to_string(),
        }
    }

    /// Street and house number joined back into one line.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!("{} {}", self.street, self.house_label())
    }
}

/// Parse a compact house number such as “72” or “72B”.
fn parse_house_number(word: &str) -> Option<(u32, Option<char>)> {
    let digits: String = word.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let mut trailing = word.chars().skip(digits.len());
    let letter = trailing.next();
    if trailing.next().is_some() {
        return None;
    }
    if let Some(candidate) = letter {
        if !candidate.is_alphabetic() {
            return None;
        }
    }
    let number = digits.parse().ok()?;
    Some((number, letter.map(|candidate| candidate.to_ascii_uppercase())))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Persisted association between an address and the provider serving it.
///
/// Written once when discovery succeeds and reused for every later
/// calendar fetch.
pub struct AddressBinding {
    /// The address exactly as the user entered it.
    pub raw_address: String,
    /// Provider that recognized the address.
    pub provider: ProviderId,
    /// Provider-side identifier for the address.
    pub address_id: String,
    /// Municipality number, needed by some providers.
    pub county_id: Option<String>,
    /// Cadastral street code, needed by some providers.
    pub street_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Raw calendar as one provider reported it: a label keyed map holding the
/// earliest upcoming date seen per label.
pub struct RawCalendar {
    entries: BTreeMap<String, NaiveDate>,
}

impl RawCalendar {
    /// Create an empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pickup for `label`, keeping the earlier date when the label
    /// was already present.
    pub fn insert_earliest(&mut self, label: impl Into<String>, date: NaiveDate) {
        self.entries
            .entry(label.into())
            .and_modify(|existing| {
                if date < *existing {
                    *existing = date;
                }
            })
            .or_insert(date);
    }

    /// Date recorded for `label`, if any.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<NaiveDate> {
        self.entries.get(label).copied()
    }

    /// Whether no labels were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct labels recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over `(label, date)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NaiveDate)> {
        self.entries.iter().map(|(label, date)| (label.as_str(), *date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A canonical category together with its earliest upcoming pickup date.
pub struct NormalizedPickup {
    /// Canonical category.
    pub category: WasteCategory,
    /// Earliest upcoming date for the category.
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of resolving the next pickup across all categories.
pub struct NextPickupSummary {
    /// Whole days until the pickup; zero means today.
    pub days_remaining: i64,
    /// Categories collected on that day, in canonical order.
    pub categories: Vec<WasteCategory>,
    /// Norwegian display string, e.g. “Rest og papp”.
    pub display: String,
}

impl NextPickupSummary {
    /// Unit text for the day-count capability, e.g. “dager (Rest, Papp)”.
    #[must_use]
    pub fn units_label(&self) -> String {
        let unit = if self.days_remaining == 1 { "dag" } else { "dager" };
        let shorts: Vec<&str> = self
            .categories
            .iter()
            .map(|category| category.short_label())
            .collect();
        format!("{unit} ({})", shorts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{AddressQuery, NextPickupSummary, RawCalendar, WasteCategory};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn parses_simple_address() {
        let query = AddressQuery::parse("Bjørnavegen 72B").expect("address should parse");
        assert_eq!(query.street, "Bjørnavegen");
        assert_eq!(query.house_number, 72);
        assert_eq!(query.letter, Some('B'));
        assert_eq!(query.post_code, None);
        assert_eq!(query.full_address(), "Bjørnavegen 72B");
    }

    #[test]
    fn parses_multi_word_street() {
        let query = AddressQuery::parse("Aasmund Vinjes vei 39").expect("address should parse");
        assert_eq!(query.street, "Aasmund Vinjes vei");
        assert_eq!(query.house_number, 39);
        assert_eq!(query.letter, None);
    }

    #[test]
    fn parses_postal_code_after_house_number() {
        let query = AddressQuery::parse("Markveien 35b, 0554").expect("address should parse");
        assert_eq!(query.street, "Markveien");
        assert_eq!(query.house_label(), "35B");
        assert_eq!(query.post_code.as_deref(), Some("0554"));
    }

    #[test]
    fn rejects_address_without_house_number() {
        assert!(AddressQuery::parse("Bjørnavegen").is_none());
        assert!(AddressQuery::parse("").is_none());
    }

    #[test]
    fn raw_calendar_keeps_earliest_date_per_label() {
        let mut calendar = RawCalendar::new();
        calendar.insert_earliest("Restavfall", date(2024, 6, 12));
        calendar.insert_earliest("Restavfall", date(2024, 6, 10));
        calendar.insert_earliest("Restavfall", date(2024, 6, 20));
        assert_eq!(calendar.get("Restavfall"), Some(date(2024, 6, 10)));
        assert_eq!(calendar.len(), 1);
    }

    #[test]
    fn units_label_switches_between_singular_and_plural() {
        let tomorrow = NextPickupSummary {
            days_remaining: 1,
            categories: vec![WasteCategory::General],
            display: "Rest".to_owned(),
        };
        assert_eq!(tomorrow.units_label(), "dag (Rest)");

        let later = NextPickupSummary {
            days_remaining: 4,
            categories: vec![WasteCategory::General, WasteCategory::Paper],
            display: "Rest og papp".to_owned(),
        };
        assert_eq!(later.units_label(), "dager (Rest, Papp)");
    }
}
