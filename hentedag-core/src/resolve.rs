//! Next-pickup computation and display-string assembly.

use chrono::NaiveDate;

use crate::dates::days_until;
use crate::model::{NextPickupSummary, NormalizedPickup, WasteCategory};

/// Compute the next-pickup summary for `today`.
///
/// Entries dated before `today` are stale calendar rows and are ignored, so
/// `days_remaining` is never negative. All categories sharing the minimal
/// date form the tie-set, ordered canonically. Returns `None` when nothing
/// upcoming remains, which callers must surface as an explicit empty state
/// rather than an error.
#[must_use]
pub fn resolve(today: NaiveDate, pickups: &[NormalizedPickup]) -> Option<NextPickupSummary> {
    let upcoming: Vec<(WasteCategory, i64)> = pickups
        .iter()
        .map(|pickup| (pickup.category, days_until(today, pickup.date)))
        .filter(|(_, days)| *days >= 0)
        .collect();

    let days_remaining = upcoming.iter().map(|(_, days)| *days).min()?;
    let mut categories: Vec<WasteCategory> = upcoming
        .into_iter()
        .filter(|(_, days)| *days == days_remaining)
        .map(|(category, _)| category)
        .collect();
    categories.sort_unstable();
    categories.dedup();

    let display = display_string(&categories);
    Some(NextPickupSummary {
        days_remaining,
        categories,
        display,
    })
}

/// Join category labels the way Norwegian lists read: one label stands
/// alone, two become “A og b”, three or more become “A, b og c”. Only the
/// first label keeps its capital letter.
#[must_use]
pub fn display_string(categories: &[WasteCategory]) -> String {
    let Some((first, rest)) = categories.split_first() else {
        return String::new();
    };
    let head = first.short_label().to_owned();
    if rest.is_empty() {
        return head;
    }

    let lowered: Vec<String> = rest
        .iter()
        .map(|category| category.short_label().to_lowercase())
        .collect();
    match lowered.split_last() {
        Some((last, middle)) if middle.is_empty() => format!("{head} og {last}"),
        Some((last, middle)) => format!("{head}, {} og {last}", middle.join(", ")),
        None => head,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{display_string, resolve};
    use crate::model::{NormalizedPickup, WasteCategory};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn pickup(category: WasteCategory, year: i32, month: u32, day: u32) -> NormalizedPickup {
        NormalizedPickup {
            category,
            date: date(year, month, day),
        }
    }

    #[test]
    fn single_upcoming_category_wins() {
        let today = date(2024, 6, 9);
        let pickups = vec![
            pickup(WasteCategory::General, 2024, 6, 10),
            pickup(WasteCategory::Paper, 2024, 6, 12),
        ];

        let summary = resolve(today, &pickups).expect("summary");
        assert_eq!(summary.days_remaining, 1);
        assert_eq!(summary.categories, vec![WasteCategory::General]);
        assert_eq!(summary.display, "Rest");
    }

    #[test]
    fn two_way_tie_joins_with_og() {
        let today = date(2024, 6, 9);
        let pickups = vec![
            pickup(WasteCategory::Paper, 2024, 6, 11),
            pickup(WasteCategory::General, 2024, 6, 11),
        ];

        let summary = resolve(today, &pickups).expect("summary");
        assert_eq!(summary.days_remaining, 2);
        assert_eq!(
            summary.categories,
            vec![WasteCategory::General, WasteCategory::Paper]
        );
        assert_eq!(summary.display, "Rest og papp");
    }

    #[test]
    fn three_way_tie_uses_comma_list_with_final_og() {
        let today = date(2024, 6, 9);
        let pickups = vec![
            pickup(WasteCategory::GlassMetal, 2024, 6, 14),
            pickup(WasteCategory::General, 2024, 6, 14),
            pickup(WasteCategory::Paper, 2024, 6, 14),
        ];

        let summary = resolve(today, &pickups).expect("summary");
        assert_eq!(summary.display, "Rest, papp og glass/metall");
    }

    #[test]
    fn pickup_today_counts_as_zero_days() {
        let today = date(2024, 6, 9);
        let pickups = vec![pickup(WasteCategory::Bio, 2024, 6, 9)];

        let summary = resolve(today, &pickups).expect("summary");
        assert_eq!(summary.days_remaining, 0);
        assert_eq!(summary.display, "Mat");
    }

    #[test]
    fn stale_entries_are_ignored() {
        let today = date(2024, 6, 9);
        let pickups = vec![
            pickup(WasteCategory::General, 2024, 6, 2),
            pickup(WasteCategory::Paper, 2024, 6, 13),
        ];

        let summary = resolve(today, &pickups).expect("summary");
        assert_eq!(summary.days_remaining, 4);
        assert_eq!(summary.categories, vec![WasteCategory::Paper]);
    }

    #[test]
    fn only_stale_entries_resolve_to_none() {
        let today = date(2024, 6, 9);
        let pickups = vec![pickup(WasteCategory::General, 2024, 6, 2)];
        assert!(resolve(today, &pickups).is_none());
    }

    #[test]
    fn empty_input_resolves_to_none() {
        assert!(resolve(date(2024, 6, 9), &[]).is_none());
    }

    #[test]
    fn tie_set_order_is_input_order_independent() {
        let today = date(2024, 6, 9);
        let forward = vec![
            pickup(WasteCategory::General, 2024, 6, 11),
            pickup(WasteCategory::GlassMetal, 2024, 6, 11),
        ];
        let reversed: Vec<_> = forward.iter().rev().copied().collect();

        let first = resolve(today, &forward).expect("summary");
        let second = resolve(today, &reversed).expect("summary");
        assert_eq!(first, second);
        assert_eq!(first.display, "Rest og glass/metall");
    }

    #[test]
    fn display_string_handles_all_arities() {
        assert_eq!(display_string(&[]), "");
        assert_eq!(display_string(&[WasteCategory::Plastic]), "Plast");
        assert_eq!(
            display_string(&[WasteCategory::General, WasteCategory::Bio]),
            "Rest og mat"
        );
        assert_eq!(
            display_string(&[
                WasteCategory::General,
                WasteCategory::Paper,
                WasteCategory::Plastic,
                WasteCategory::GlassMetal
            ]),
            "Rest, papp, plast og glass/metall"
        );
    }
}
