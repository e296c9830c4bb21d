//! Norwegian date parsing and formatting helpers shared by the providers.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::ports::PortError;

/// Accepted spellings per month, shortest first. A fragment matches when it
/// starts with one of the aliases, so both “aug” and “august” resolve.
const MONTH_ALIASES: [&[&str]; 12] = [
    &["jan", "januar"],
    &["feb", "februar"],
    &["mar", "mars"],
    &["apr", "april"],
    &["mai"],
    &["jun", "juni"],
    &["jul", "juli"],
    &["aug", "august"],
    &["sep", "september"],
    &["okt", "oktober"],
    &["nov", "november"],
    &["des", "desember"],
];

/// Resolve a Norwegian month name or abbreviation to its number.
///
/// # Errors
///
/// Returns [`PortError::UnknownMonth`] when the name matches no month. An
/// unrecognized month means the provider changed its response format, so
/// callers must treat this as a hard failure rather than guess.
pub fn month_number(name: &str) -> Result<u32, PortError> {
    let lowered = name.trim().to_lowercase();
    for (month, aliases) in (1..).zip(MONTH_ALIASES) {
        if aliases.iter().any(|alias| lowered.starts_with(alias)) {
            return Ok(month);
        }
    }
    Err(PortError::UnknownMonth(name.trim().to_owned()))
}

/// Cutoff for deciding which year a yearless date belongs to.
const YEAR_WRAP_CUTOFF_DAYS: i64 = 183;

/// Place a yearless day/month in `today`'s year, rolling one year forward
/// when that lands more than half a year in the past. Provider pages print
/// dates without a year, so a January pickup scraped in late December is
/// next January, not last.
#[must_use]
pub fn date_in_closest_year(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if today.signed_duration_since(candidate).num_days() > YEAR_WRAP_CUTOFF_DAYS {
        return NaiveDate::from_ymd_opt(today.year() + 1, month, day);
    }
    Some(candidate)
}

/// Parse a day/month fragment with a named month, such as “4. apr” or
/// “12. august”, into the year closest to `today` (see
/// [`date_in_closest_year`]).
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when the fragment has no day number and
/// [`PortError::UnknownMonth`] when the month name is unrecognized.
pub fn parse_day_month(fragment: &str, today: NaiveDate) -> Result<NaiveDate, PortError> {
    let mut parts = fragment.splitn(2, '.');
    let day: u32 = parts
        .next()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| malformed_fragment(fragment))?;
    let month = parts
        .next()
        .map(month_number)
        .transpose()?
        .ok_or_else(|| malformed_fragment(fragment))?;
    date_in_closest_year(day, month, today).ok_or_else(|| malformed_fragment(fragment))
}

/// Parse a numeric day/month fragment such as “12.04” or “05.07.2024” into
/// the year closest to `today`. Anything after the month segment is
/// ignored.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when day or month are missing or out of
/// range.
pub fn parse_day_month_numeric(fragment: &str, today: NaiveDate) -> Result<NaiveDate, PortError> {
    let mut parts = fragment.split('.');
    let day: u32 = parts
        .next()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| malformed_fragment(fragment))?;
    let month: u32 = parts
        .next()
        .map(str::trim)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| malformed_fragment(fragment))?;
    date_in_closest_year(day, month, today).ok_or_else(|| malformed_fragment(fragment))
}

/// Parse the date part of an ISO timestamp such as “2024-06-10T00:00:00”
/// or a bare “2024-06-10”.
///
/// # Errors
///
/// Returns [`PortError::Parse`] when the value is not an ISO date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, PortError> {
    let day_part = value.split('T').next().unwrap_or(value).trim();
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").map_err(PortError::from)
}

/// Whole calendar days from `today` until `date`; negative when past.
#[must_use]
pub fn days_until(today: NaiveDate, date: NaiveDate) -> i64 {
    date.signed_duration_since(today).num_days()
}

/// Format a date the way the nb-NO locale renders it, e.g. “mandag 5. august”.
#[must_use]
pub fn format_long(date: NaiveDate) -> String {
    format!("{} {}. {}", weekday_name(date.weekday()), date.day(), month_name(date.month()))
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mandag",
        Weekday::Tue => "tirsdag",
        Weekday::Wed => "onsdag",
        Weekday::Thu => "torsdag",
        Weekday::Fri => "fredag",
        Weekday::Sat => "lørdag",
        Weekday::Sun => "søndag",
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "januar",
        2 => "februar",
        3 => "mars",
        4 => "april",
        5 => "mai",
        6 => "juni",
        7 => "juli",
        8 => "august",
        9 => "september",
        10 => "oktober",
        11 => "november",
        _ => "desember",
    }
}

fn malformed_fragment(fragment: &str) -> PortError {
    PortError::Malformed(format!("unparseable date fragment: {fragment}"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        date_in_closest_year, days_until, format_long, month_number, parse_day_month,
        parse_day_month_numeric, parse_iso_date,
    };
    use crate::ports::PortError;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn resolves_abbreviated_and_full_month_names() {
        assert_eq!(month_number("jan").expect("month"), 1);
        assert_eq!(month_number("januar").expect("month"), 1);
        assert_eq!(month_number("mai").expect("month"), 5);
        assert_eq!(month_number("AUGUST").expect("month"), 8);
        assert_eq!(month_number(" des ").expect("month"), 12);
    }

    #[test]
    fn unknown_month_is_a_hard_error() {
        let error = month_number("frimaire").expect_err("should not resolve");
        assert!(matches!(error, PortError::UnknownMonth(name) if name == "frimaire"));
    }

    #[test]
    fn parses_named_day_month_fragments() {
        let today = date(2024, 4, 1);
        assert_eq!(parse_day_month("4. apr", today).expect("date"), date(2024, 4, 4));
        assert_eq!(parse_day_month("12. august", today).expect("date"), date(2024, 8, 12));
    }

    #[test]
    fn parses_numeric_fragments_and_ignores_trailing_year() {
        let today = date(2024, 4, 1);
        assert_eq!(parse_day_month_numeric("12.04", today).expect("date"), date(2024, 4, 12));
        assert_eq!(
            parse_day_month_numeric("05.07.2031", today).expect("date"),
            date(2024, 7, 5)
        );
    }

    #[test]
    fn rejects_fragments_without_a_day() {
        let today = date(2024, 4, 1);
        assert!(parse_day_month("neste uke", today).is_err());
        assert!(parse_day_month_numeric("..", today).is_err());
    }

    #[test]
    fn january_fragments_scraped_in_december_land_in_the_next_year() {
        let today = date(2024, 12, 20);
        assert_eq!(parse_day_month("5. jan", today).expect("date"), date(2025, 1, 5));
        assert_eq!(parse_day_month_numeric("03.01", today).expect("date"), date(2025, 1, 3));
    }

    #[test]
    fn recent_past_dates_stay_in_the_current_year() {
        let today = date(2024, 6, 9);
        assert_eq!(parse_day_month_numeric("03.06", today).expect("date"), date(2024, 6, 3));
        // Five months back is within the cutoff; the resolver decides what
        // to do with a past date, not the parser.
        assert_eq!(date_in_closest_year(2, 1, today), Some(date(2024, 1, 2)));
    }

    #[test]
    fn parses_iso_dates_with_and_without_time() {
        assert_eq!(
            parse_iso_date("2024-06-10T00:00:00").expect("date"),
            date(2024, 6, 10)
        );
        assert_eq!(parse_iso_date("2024-06-10").expect("date"), date(2024, 6, 10));
        assert!(parse_iso_date("10.06.2024").is_err());
    }

    #[test]
    fn day_difference_counts_calendar_days() {
        assert_eq!(days_until(date(2024, 6, 9), date(2024, 6, 10)), 1);
        assert_eq!(days_until(date(2024, 6, 9), date(2024, 6, 9)), 0);
        assert_eq!(days_until(date(2024, 6, 9), date(2024, 6, 7)), -2);
    }

    #[test]
    fn formats_dates_in_norwegian() {
        // 2024-08-05 is a Monday.
        assert_eq!(format_long(date(2024, 8, 5)), "mandag 5. august");
        assert_eq!(format_long(date(2024, 12, 24)), "tirsdag 24. desember");
    }
}
