use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use core_types::UNKNOWN_BANK;
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATE_TIME_FORMATS: [&str; 12] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Textual nulls that spreadsheet exports leave behind in name columns.
const NULL_TOKENS: [&str; 3] = ["NAN", "NONE", "NULL"];

/// Parses a date cell. Accepts ISO and day-first layouts, any of those with
/// a trailing time, RFC 3339 timestamps and Excel serial day numbers.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date_time(s).map(|dt| dt.date()))
}

/// Parses a combined date/time cell. A bare date is read as midnight.
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .or_else(|| parse_excel_serial(s))
}

/// Excel stores dates as days since 1899-12-30, with the time of day as the
/// fractional part.
fn parse_excel_serial(s: &str) -> Option<NaiveDateTime> {
    let serial: f64 = s.parse().ok()?;
    // 1900-01-01 through 9999-12-31.
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::days(days) + Duration::seconds(seconds))
}

/// Parses a numeric cell into a decimal.
///
/// All whitespace is dropped first, including the non-breaking and narrow
/// spaces used as thousands separators, and a comma is read as the decimal
/// separator: `"1 234,56"` and `"1234.56"` are the same value.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains(['e', 'E']) {
        return Decimal::from_scientific(cleaned).ok();
    }
    Decimal::from_str(cleaned).ok()
}

/// Parses an hour or minute cell. Spreadsheet floats such as `"7.0"` are
/// accepted as long as they are whole numbers.
pub fn parse_whole_number(s: &str) -> Option<i64> {
    let value = parse_decimal(s)?;
    if !value.fract().is_zero() {
        return None;
    }
    i64::try_from(value.trunc()).ok()
}

/// Trims and uppercases a counterparty name; blanks and textual nulls
/// become `UNKNOWN BANK`.
pub fn normalize_bank(raw: Option<&str>) -> String {
    let name = raw.unwrap_or_default().trim().to_uppercase();
    if name.is_empty() || NULL_TOKENS.contains(&name.as_str()) {
        UNKNOWN_BANK.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dates_in_common_layouts() {
        assert_eq!(parse_date("2024-01-05"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("05/01/2024"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("05-01-2024"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("2024/01/05"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05 13:45:00"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("45296"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn date_times_expose_hour_and_minute() {
        let dt = parse_date_time("2024-01-05 13:45:10").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (13, 45));

        let dt = parse_date_time("2024-01-05T09:07:00+02:00").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (9, 7));

        let dt = parse_date_time("45296.5").unwrap();
        assert_eq!((dt.date(), dt.hour(), dt.minute()), (ymd(2024, 1, 5), 12, 0));

        let dt = parse_date_time("05/01/2024").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (0, 0));
    }

    #[test]
    fn decimals_with_either_separator() {
        assert_eq!(parse_decimal("1 234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("1\u{a0}234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("1.085"), Some(dec!(1.085)));
        assert_eq!(parse_decimal("+42"), Some(dec!(42)));
        assert_eq!(parse_decimal("1.5e3"), Some(dec!(1500)));
        assert_eq!(parse_decimal("-3"), Some(dec!(-3)));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1,234.56"), None);
        assert_eq!(parse_decimal("  "), None);
    }

    #[test]
    fn whole_numbers_only() {
        assert_eq!(parse_whole_number("7"), Some(7));
        assert_eq!(parse_whole_number("7.0"), Some(7));
        assert_eq!(parse_whole_number("-1"), Some(-1));
        assert_eq!(parse_whole_number("7.5"), None);
        assert_eq!(parse_whole_number("seven"), None);
    }

    #[test]
    fn bank_names_are_uppercase_and_never_empty() {
        assert_eq!(normalize_bank(Some("  acme bank ")), "ACME BANK");
        assert_eq!(normalize_bank(Some("BnP")), "BNP");
        assert_eq!(normalize_bank(Some("")), UNKNOWN_BANK);
        assert_eq!(normalize_bank(Some(" \t ")), UNKNOWN_BANK);
        assert_eq!(normalize_bank(Some("nan")), UNKNOWN_BANK);
        assert_eq!(normalize_bank(None), UNKNOWN_BANK);
    }
}
