//! Calendar helpers shared by the date-driven stages.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::AnyValue;
use sales_common::any_to_string;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Reads a transaction date from a polars `Date` or from text.
pub fn parse_transaction_date(value: AnyValue<'_>) -> Option<NaiveDate> {
    match value {
        AnyValue::Null => None,
        AnyValue::Date(days) => epoch().checked_add_signed(chrono::Duration::days(i64::from(days))),
        other => parse_date_text(&any_to_string(other)),
    }
}

fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    // Datetimes with offsets or odd precision: the leading ISO date is enough.
    trimmed
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Last calendar day of a month.
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Parses `YYYYM` or `YYYYMM` into the first day of that month.
pub fn parse_year_month(text: &str) -> Option<NaiveDate> {
    if !(5..=6).contains(&text.len()) || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = text[..4].parse().ok()?;
    let month: u32 = text[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Days since 1970-01-01, the physical value of a polars `Date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    i32::try_from(date.signed_duration_since(epoch()).num_days()).unwrap_or(i32::MAX)
}

/// Calendar year and month number (1-12).
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_transaction_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2017, 5, 9);
        assert_eq!(parse_transaction_date(AnyValue::String("2017-05-09")), expected);
        assert_eq!(parse_transaction_date(AnyValue::String("05/09/2017")), expected);
        assert_eq!(
            parse_transaction_date(AnyValue::String("2017-05-09 13:45:00")),
            expected
        );
        assert_eq!(
            parse_transaction_date(AnyValue::String("2017-05-09T00:00:00+02:00")),
            expected
        );
        assert_eq!(parse_transaction_date(AnyValue::Date(17295)), expected);
        assert_eq!(parse_transaction_date(AnyValue::String("soon")), None);
        assert_eq!(parse_transaction_date(AnyValue::Null), None);
    }

    #[test]
    fn test_month_end() {
        assert_eq!(month_end(2018, 4), NaiveDate::from_ymd_opt(2018, 4, 30));
        assert_eq!(month_end(2018, 12), NaiveDate::from_ymd_opt(2018, 12, 31));
        assert_eq!(month_end(2020, 2), NaiveDate::from_ymd_opt(2020, 2, 29));
        assert_eq!(month_end(2018, 13), None);
    }

    #[test]
    fn test_parse_year_month() {
        assert_eq!(parse_year_month("20184"), NaiveDate::from_ymd_opt(2018, 4, 1));
        assert_eq!(parse_year_month("201812"), NaiveDate::from_ymd_opt(2018, 12, 1));
        assert_eq!(parse_year_month("201813"), None);
        assert_eq!(parse_year_month("2018"), None);
        assert_eq!(parse_year_month("2018-4"), None);
    }

    #[test]
    fn test_days_since_epoch() {
        let date = NaiveDate::from_ymd_opt(2018, 4, 1).unwrap();
        assert_eq!(days_since_epoch(date), 17622);
    }

    proptest! {
        #[test]
        fn year_month_text_round_trips(year in 1000i32..=9999, month in 1u32..=12) {
            let parsed = parse_year_month(&format!("{year}{month}")).unwrap();
            prop_assert_eq!(year_month(parsed), (year, month));
        }
    }
}
