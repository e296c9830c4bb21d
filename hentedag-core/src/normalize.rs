//! Mapping of provider label vocabularies onto the canonical categories.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{NormalizedPickup, RawCalendar, WasteCategory};

/// Raw labels recognized per category. Covers both natural-language labels
/// and the numeric fraction codes used by the Komtek API. A label may appear
/// under several categories; code “17” is a combined rest/food fraction and
/// contributes a date to both.
const CATEGORY_LABELS: [(WasteCategory, &[&str]); 5] = [
    (
        WasteCategory::General,
        &["Restavfall", "Rest", "1", "27", "17"],
    ),
    (
        WasteCategory::Paper,
        &[
            "Papir",
            "Papp",
            "Papp og papir",
            "Papp/papir",
            "Papir Og Plastemballasje",
            "Papir, papp og sekker plastemballasje",
            "Papp, papir og plastemballasje",
            "2",
            "13",
            "28",
        ],
    ),
    (
        WasteCategory::Plastic,
        &[
            "Plast",
            "Plastemballasje",
            "Sekker plastemballasje",
            "Papir Og Plastemballasje",
            "Papir, papp og sekker plastemballasje",
            "Papp, papir og plastemballasje",
            "7",
        ],
    ),
    (
        WasteCategory::Bio,
        &[
            "Mat",
            "Matavfall",
            "Bio",
            "Bioavfall",
            "Våtorganisk",
            "3",
            "26",
            "17",
        ],
    ),
    (
        WasteCategory::GlassMetal,
        &[
            "Glass",
            "Glassemballasje",
            "Metall",
            "Metallavfall",
            "Hermetikk",
            "Glass og metallemballasje",
            "Glass- og metallemballasje",
            "4",
            "11",
        ],
    ),
];

/// Collapse a raw provider calendar into canonical categories.
///
/// Every raw label is checked against the lookup table; matching categories
/// receive the label's date, keeping the earliest date when several labels
/// feed the same category. Unrecognized labels are dropped. The result is
/// ordered canonically and carries at most one entry per category.
#[must_use]
pub fn normalize(raw: &RawCalendar) -> Vec<NormalizedPickup> {
    let mut earliest: BTreeMap<WasteCategory, NaiveDate> = BTreeMap::new();
    for (label, date) in raw.iter() {
        let mut recognized = false;
        for (category, labels) in &CATEGORY_LABELS {
            if labels.contains(&label) {
                recognized = true;
                earliest
                    .entry(*category)
                    .and_modify(|existing| {
                        if date < *existing {
                            *existing = date;
                        }
                    })
                    .or_insert(date);
            }
        }
        if !recognized {
            debug!(label, "dropping unrecognized waste label");
        }
    }
    earliest
        .into_iter()
        .map(|(category, date)| NormalizedPickup { category, date })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::normalize;
    use crate::model::{RawCalendar, WasteCategory};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn maps_natural_labels_to_canonical_categories() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("Restavfall", date(2024, 6, 10));
        raw.insert_earliest("Papp/papir", date(2024, 6, 11));
        raw.insert_earliest("Plastemballasje", date(2024, 6, 12));
        raw.insert_earliest("Matavfall", date(2024, 6, 13));
        raw.insert_earliest("Glass og metallemballasje", date(2024, 6, 14));

        let normalized = normalize(&raw);
        let categories: Vec<WasteCategory> =
            normalized.iter().map(|pickup| pickup.category).collect();
        assert_eq!(categories, WasteCategory::ALL.to_vec());
    }

    #[test]
    fn keeps_earliest_date_when_labels_collide() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("Papir", date(2024, 6, 12));
        raw.insert_earliest("Papp", date(2024, 6, 10));

        let normalized = normalize(&raw);
        assert_eq!(normalized.len(), 1);
        let paper = normalized.first().expect("paper entry");
        assert_eq!(paper.category, WasteCategory::Paper);
        assert_eq!(paper.date, date(2024, 6, 10));
    }

    #[test]
    fn drops_unknown_labels() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("Tekstil", date(2024, 6, 10));
        raw.insert_earliest("Farlig avfall", date(2024, 6, 11));
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn numeric_codes_map_to_categories() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("2", date(2024, 6, 10));
        raw.insert_earliest("7", date(2024, 6, 11));

        let normalized = normalize(&raw);
        assert_eq!(normalized.len(), 2);
        assert!(normalized
            .iter()
            .any(|pickup| pickup.category == WasteCategory::Paper && pickup.date == date(2024, 6, 10)));
        assert!(normalized
            .iter()
            .any(|pickup| pickup.category == WasteCategory::Plastic
                && pickup.date == date(2024, 6, 11)));
    }

    #[test]
    fn combined_code_feeds_both_general_and_bio() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("17", date(2024, 6, 10));

        let normalized = normalize(&raw);
        assert_eq!(normalized.len(), 2);
        assert!(normalized
            .iter()
            .all(|pickup| pickup.date == date(2024, 6, 10)));
        assert!(normalized
            .iter()
            .any(|pickup| pickup.category == WasteCategory::General));
        assert!(normalized
            .iter()
            .any(|pickup| pickup.category == WasteCategory::Bio));
    }

    #[test]
    fn split_glass_and_metal_labels_collapse_into_one_category() {
        let mut raw = RawCalendar::new();
        raw.insert_earliest("Glass", date(2024, 6, 14));
        raw.insert_earliest("Metall", date(2024, 6, 14));

        let normalized = normalize(&raw);
        assert_eq!(normalized.len(), 1);
        let entry = normalized.first().expect("glass/metal entry");
        assert_eq!(entry.category, WasteCategory::GlassMetal);
        assert_eq!(entry.date, date(2024, 6, 14));
    }
}
