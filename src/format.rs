//! Localized rendering helpers shared by the report and matrix builders.
//!
//! Prices render in Brazilian convention (`R$ 1.234,56`), percentages keep
//! the `%` suffix with a `.` decimal separator, matching the dashboard the
//! engine feeds.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{AnyValue, TimeUnit};

use crate::schema::datefmt;

/// Format a BRL amount: thousands separated by `.`, decimals by `,`.
pub fn brl(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("R$ {sign}{grouped},{frac:02}")
}

/// `0.1234` → `"12.34%"`.
pub fn percent2(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// `0.1234` → `"12.3%"`.
pub fn percent1(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Polars Date physical value (days since epoch) to a calendar date.
pub fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + Duration::days(days as i64)
}

/// Calendar date back to the Polars Date physical value.
pub fn days_from_date(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

pub fn datetime_from_micros(us: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_micros(us).map(|dt| dt.naive_utc())
}

pub(crate) fn micros_from_any_unit(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => value / 1_000,
        TimeUnit::Microseconds => value,
        TimeUnit::Milliseconds => value * 1_000,
    }
}

/// Stringify a cell the way the filter layer compares values: `None` for
/// null, calendar formats for temporal types, `Display` otherwise.
pub(crate) fn any_to_display(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some((*s).to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Date(days) => {
            Some(date_from_days(*days).format(datefmt::ISO_DATE).to_string())
        }
        AnyValue::Datetime(us, unit, _) => datetime_from_micros(micros_from_any_unit(*us, *unit))
            .map(|dt| dt.format(datefmt::ISO_DATETIME).to_string()),
        AnyValue::DatetimeOwned(us, unit, _) => {
            datetime_from_micros(micros_from_any_unit(*us, *unit))
                .map(|dt| dt.format(datefmt::ISO_DATETIME).to_string())
        }
        AnyValue::Time(ns) => NaiveTime::from_num_seconds_from_midnight_opt(
            (*ns / 1_000_000_000) as u32,
            (*ns % 1_000_000_000) as u32,
        )
        .map(|t| t.format("%H:%M:%S").to_string()),
        other => Some(format!("{other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn brl_groups_thousands_and_swaps_separators() {
        assert_eq!(brl(1234.5), "R$ 1.234,50");
        assert_eq!(brl(999.99), "R$ 999,99");
        assert_eq!(brl(1_234_567.89), "R$ 1.234.567,89");
        assert_eq!(brl(0.0), "R$ 0,00");
        assert_eq!(brl(-1234.56), "R$ -1.234,56");
    }

    #[test]
    fn percent_formats() {
        assert_eq!(percent2(0.1234), "12.34%");
        assert_eq!(percent2(-0.333333), "-33.33%");
        assert_eq!(percent1(0.2), "20.0%");
    }

    #[test]
    fn date_roundtrip() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 26).unwrap();
        assert_eq!(date_from_days(days_from_date(d)), d);
        assert_eq!(date_from_days(0), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    }

    #[test]
    fn any_display_covers_temporal_types() {
        assert_eq!(any_to_display(&AnyValue::Null), None);
        assert_eq!(
            any_to_display(&AnyValue::String("Foco")),
            Some("Foco".to_string())
        );
        let days = days_from_date(NaiveDate::from_ymd_opt(2025, 9, 26).unwrap());
        assert_eq!(
            any_to_display(&AnyValue::Date(days)),
            Some("2025-09-26".to_string())
        );
        assert_eq!(
            any_to_display(&AnyValue::Float64(123.45)),
            Some("123.45".to_string())
        );
    }
}
