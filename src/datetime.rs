//! Last-movement timestamp resolution
//!
//! Order exports carry the last movement either as one combined value or as
//! separate date and time columns, written year-first, day-first, with two-digit
//! years, or as spreadsheet serial numbers. Every parser here returns `Option`;
//! an unreadable value is a data-quality finding, never an error.

use crate::fields::LogicalField;
use crate::models::{DataQualityIssue, RawOrderRecord};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

/// Two-digit years at or above the pivot are 19xx, below it 20xx
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

/// Hour used when only a date is known. Noon keeps the calendar day stable
/// under later timezone shifts.
pub const DEFAULT_HOUR: u32 = 12;

/// Largest spreadsheet serial (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Smallest serial accepted when written as text (1927-05-18). Shorter numbers
/// such as a bare year are not dates.
const MIN_TEXT_SERIAL: f64 = 10_000.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

static YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})",
        r"(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([AaPp])-?\s*[Mm]-?)?)?(?:\D|$)",
    ))
    .expect("invalid year-first pattern")
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\d{1,2})-(\d{1,2})-(\d{4}|\d{2})",
        r"(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([AaPp])-?\s*[Mm]-?)?)?(?:\D|$)",
    ))
    .expect("invalid day-first pattern")
});

static ISO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[-/]").expect("invalid iso prefix pattern"));

static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?(?:\s*([AaPp])\.?\s*[Mm]\.?)?")
        .expect("invalid time pattern")
});

/// A date and, when the source wrote one, its time of day
type DateParts = (NaiveDate, Option<NaiveTime>);

/// String parser applied to separator-normalized input
type Strategy = fn(&str) -> Option<DateParts>;

const STRING_STRATEGIES: [Strategy; 2] = [year_first, day_first];

fn spreadsheet_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

fn group<T: FromStr>(caps: &Captures<'_>, index: usize) -> Option<T> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

pub fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() > 2 {
        Some(year)
    } else if year >= TWO_DIGIT_YEAR_PIVOT {
        Some(1900 + year)
    } else {
        Some(2000 + year)
    }
}

/// Clamp to a valid wall-clock time, honoring an optional a.m./p.m. marker
fn clock_time(hour: u32, minute: u32, second: u32, meridiem: Option<char>) -> Option<NaiveTime> {
    let hour = match meridiem.map(|c| c.to_ascii_lowercase()) {
        Some('p') if hour < 12 => hour + 12,
        Some('a') if hour == 12 => 0,
        _ => hour,
    };
    NaiveTime::from_hms_opt(hour.min(23), minute.min(59), second.min(59))
}

/// Time captured at `first` (hour), `first + 1` (minute), optional seconds and meridiem
fn captured_time(caps: &Captures<'_>, first: usize) -> Option<NaiveTime> {
    let hour = group(caps, first)?;
    let minute = group(caps, first + 1)?;
    let second = group(caps, first + 2).unwrap_or(0);
    let meridiem = caps.get(first + 3).and_then(|m| m.as_str().chars().next());
    clock_time(hour, minute, second, meridiem)
}

fn year_first(s: &str) -> Option<DateParts> {
    let caps = YEAR_FIRST.captures(s)?;
    let date = NaiveDate::from_ymd_opt(group(&caps, 1)?, group(&caps, 2)?, group(&caps, 3)?)?;
    Some((date, captured_time(&caps, 4)))
}

fn day_first(s: &str) -> Option<DateParts> {
    let caps = DAY_FIRST.captures(s)?;
    let year = expand_year(caps.get(3)?.as_str())?;
    let date = NaiveDate::from_ymd_opt(year, group(&caps, 2)?, group(&caps, 1)?)?;
    Some((date, captured_time(&caps, 4)))
}

fn normalize_separators(raw: &str) -> String {
    raw.trim().replace(['.', '/'], "-")
}

/// Year-first or day-first date string, with an optional time
pub fn parse_date_string(raw: &str) -> Option<DateParts> {
    let normalized = normalize_separators(raw);
    if ISO_PREFIX.is_match(&normalized) {
        if let Some(parts) = year_first(&normalized) {
            return Some(parts);
        }
    }
    STRING_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&normalized))
}

fn at_time_or_noon(date: NaiveDate, time: Option<NaiveTime>) -> Option<NaiveDateTime> {
    match time {
        Some(time) => Some(date.and_time(time)),
        None => date.and_hms_opt(DEFAULT_HOUR, 0, 0),
    }
}

/// Parse a combined date+time string. A missing time means noon.
pub fn parse_datetime_str(raw: &str) -> Option<NaiveDateTime> {
    let (date, time) = parse_date_string(raw)?;
    at_time_or_noon(date, time)
}

/// Day-count serial with the 1899-12-30 epoch. The fraction is ignored.
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    spreadsheet_epoch()?.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Fraction of a day to hours and whole minutes. The integral part is dropped.
pub fn time_from_day_fraction(value: f64) -> Option<NaiveTime> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // nearest second absorbs float noise, then truncate so 23:59:45 stays 23:59
    let seconds = ((value.fract() * SECONDS_PER_DAY).round() as u32).min(86_399);
    let minutes = seconds / 60;
    clock_time(minutes / 60, minutes % 60, 0, None)
}

/// Serial carrying both date and time. Whole numbers are dates at noon.
pub fn datetime_from_serial(serial: f64) -> Option<NaiveDateTime> {
    let date = date_from_serial(serial)?;
    let time = if serial.fract() == 0.0 {
        None
    } else {
        time_from_day_fraction(serial)
    };
    at_time_or_noon(date, time)
}

/// `HH:MM[:SS]`, hour clamped to 0..=23 and minute to 0..=59
pub fn parse_time_string(raw: &str) -> Option<NaiveTime> {
    let caps = TIME_OF_DAY.captures(raw.trim())?;
    captured_time(&caps, 1)
}

/// Serial written as text, e.g. a CSV cell holding "45504.5"
fn text_serial(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|serial| *serial >= MIN_TEXT_SERIAL)
}

fn combined_from_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n.as_f64().and_then(datetime_from_serial),
        Value::String(s) => {
            parse_datetime_str(s).or_else(|| text_serial(s).and_then(datetime_from_serial))
        }
        _ => None,
    }
}

fn date_from_value(value: &Value) -> Option<DateParts> {
    match value {
        Value::Number(n) => n.as_f64().and_then(date_from_serial).map(|d| (d, None)),
        Value::String(s) => parse_date_string(s)
            .or_else(|| text_serial(s).and_then(date_from_serial).map(|d| (d, None))),
        _ => None,
    }
}

fn time_from_value(value: &Value) -> Option<NaiveTime> {
    match value {
        Value::Number(n) => n.as_f64().and_then(time_from_day_fraction),
        Value::String(s) => parse_time_string(s).or_else(|| {
            // spreadsheet fraction written as text, e.g. "0.604166"
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| (0.0..1.0).contains(f))
                .and_then(time_from_day_fraction)
        }),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unparsable(record_index: usize, field: &str, value: &Value) -> DataQualityIssue {
    let value = display_value(value);
    warn!(
        "Unparsable {} in record {}: {:?}",
        field, record_index, value
    );
    DataQualityIssue {
        record_index,
        field: field.to_string(),
        value,
    }
}

/// Outcome of resolving one record's last movement
#[derive(Debug, Clone, PartialEq)]
pub struct MovementResolution {
    pub at: Option<NaiveDateTime>,
    pub issues: Vec<DataQualityIssue>,
}

/// Combined field first, then date plus time, else unknown
pub fn resolve_last_movement(record: &RawOrderRecord, record_index: usize) -> MovementResolution {
    let mut issues = Vec::new();

    if let Some((key, value)) = LogicalField::LastMovement.resolve(record) {
        match combined_from_value(value) {
            Some(at) => return MovementResolution { at: Some(at), issues },
            None => issues.push(unparsable(record_index, key, value)),
        }
    }

    let at = match LogicalField::MovementDate.resolve(record) {
        Some((key, value)) => match date_from_value(value) {
            Some((date, written_time)) => {
                let time = match LogicalField::MovementTime.resolve(record) {
                    Some((time_key, time_value)) => {
                        let parsed = time_from_value(time_value);
                        if parsed.is_none() {
                            issues.push(unparsable(record_index, time_key, time_value));
                        }
                        parsed
                    }
                    None => None,
                };
                at_time_or_noon(date, time.or(written_time))
            }
            None => {
                issues.push(unparsable(record_index, key, value));
                None
            }
        },
        None => None,
    };

    MovementResolution { at, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn record(value: Value) -> RawOrderRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_iso_combined_string() {
        assert_eq!(
            parse_datetime_str("2025-08-01T10:15:00"),
            Some(dt(2025, 8, 1, 10, 15, 0))
        );
        assert_eq!(
            parse_datetime_str("2025/08/01 07:05"),
            Some(dt(2025, 8, 1, 7, 5, 0))
        );
        assert_eq!(
            parse_datetime_str("2025-08-01T10:15:30.000Z"),
            Some(dt(2025, 8, 1, 10, 15, 30))
        );
    }

    #[test]
    fn test_day_first_combined_string() {
        assert_eq!(
            parse_datetime_str("01/08/2025 14:30"),
            Some(dt(2025, 8, 1, 14, 30, 0))
        );
        assert_eq!(
            parse_datetime_str("1.8.2025 9:05:10"),
            Some(dt(2025, 8, 1, 9, 5, 10))
        );
        assert_eq!(
            parse_datetime_str("01/08/2025 02:30 p. m."),
            Some(dt(2025, 8, 1, 14, 30, 0))
        );
    }

    #[test]
    fn test_missing_time_defaults_to_noon() {
        assert_eq!(parse_datetime_str("2025-08-01"), Some(dt(2025, 8, 1, 12, 0, 0)));
        assert_eq!(parse_datetime_str("15-03-2024"), Some(dt(2024, 3, 15, 12, 0, 0)));
    }

    #[test]
    fn test_two_digit_years_pivot_at_seventy() {
        assert_eq!(expand_year("25"), Some(2025));
        assert_eq!(expand_year("69"), Some(2069));
        assert_eq!(expand_year("70"), Some(1970));
        assert_eq!(expand_year("99"), Some(1999));
        assert_eq!(expand_year("2025"), Some(2025));
        assert_eq!(parse_datetime_str("01/08/25"), Some(dt(2025, 8, 1, 12, 0, 0)));
        assert_eq!(parse_datetime_str("01/08/85 08:00"), Some(dt(1985, 8, 1, 8, 0, 0)));
    }

    #[test]
    fn test_rejects_impossible_and_garbage_dates() {
        assert_eq!(parse_datetime_str("31/02/2025"), None);
        assert_eq!(parse_datetime_str("2025-13-01"), None);
        assert_eq!(parse_datetime_str("not-a-date"), None);
        assert_eq!(parse_datetime_str(""), None);
        assert_eq!(parse_datetime_str("2025-08-0123"), None);
    }

    #[test]
    fn test_serial_dates_use_spreadsheet_epoch() {
        let expected = NaiveDate::from_ymd_opt(1899, 12, 30)
            .unwrap()
            .checked_add_signed(Duration::days(45504))
            .unwrap();
        assert_eq!(date_from_serial(45504.0), Some(expected));
        assert_eq!(expected, NaiveDate::from_ymd_opt(2024, 7, 31).unwrap());
        assert_eq!(date_from_serial(45504.99), Some(expected));
        assert_eq!(date_from_serial(-3.0), None);
        assert_eq!(date_from_serial(f64::NAN), None);
        assert_eq!(date_from_serial(1e18), None);
    }

    #[test]
    fn test_day_fraction_times() {
        assert_eq!(time_from_day_fraction(0.5), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(time_from_day_fraction(0.75), NaiveTime::from_hms_opt(18, 0, 0));
        // 14:30 is 870 minutes
        assert_eq!(
            time_from_day_fraction(870.0 / 1440.0),
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(
            time_from_day_fraction(45504.25),
            NaiveTime::from_hms_opt(6, 0, 0)
        );
        assert_eq!(time_from_day_fraction(-0.5), None);
        assert_eq!(
            datetime_from_serial(45504.75),
            Some(dt(2024, 7, 31, 18, 0, 0))
        );
        assert_eq!(datetime_from_serial(45504.0), Some(dt(2024, 7, 31, 12, 0, 0)));
    }

    #[test]
    fn test_last_seconds_of_the_day_stay_in_the_last_minute() {
        let fraction = (23.0 * 3600.0 + 59.0 * 60.0 + 45.0) / 86400.0;
        assert_eq!(
            time_from_day_fraction(fraction),
            NaiveTime::from_hms_opt(23, 59, 0)
        );
        assert_eq!(
            time_from_day_fraction(0.999_999_9),
            NaiveTime::from_hms_opt(23, 59, 0)
        );
        assert_eq!(
            time_from_day_fraction(870.5 / 1440.0),
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(
            datetime_from_serial(45504.9999),
            Some(dt(2024, 7, 31, 23, 59, 0))
        );

        let row = record(json!({ "fecha": 45504, "hora": fraction }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2024, 7, 31, 23, 59, 0)));
    }

    #[test]
    fn test_short_numeric_text_is_not_a_serial() {
        let row = record(json!({ "ULTIMO MOVIMIENTO": "2025" }));
        let resolved = resolve_last_movement(&row, 3);
        assert_eq!(resolved.at, None);
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].field, "ULTIMO MOVIMIENTO");
        assert_eq!(resolved.issues[0].value, "2025");

        let row = record(json!({ "FECHA": "812" }));
        assert_eq!(resolve_last_movement(&row, 0).at, None);

        let row = record(json!({ "ultimo_movimiento": "45504.75" }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2024, 7, 31, 18, 0, 0)));
    }

    #[test]
    fn test_time_strings_are_clamped() {
        assert_eq!(parse_time_string("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse_time_string(" 7:05:09 "), NaiveTime::from_hms_opt(7, 5, 9));
        assert_eq!(parse_time_string("25:75"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_time_string("12:15 a.m."), NaiveTime::from_hms_opt(0, 15, 0));
        assert_eq!(parse_time_string("3:00 PM"), NaiveTime::from_hms_opt(15, 0, 0));
        assert_eq!(parse_time_string("mediodia"), None);
    }

    #[test]
    fn test_split_date_and_time() {
        let row = record(json!({ "FECHA": "01/08/2025", "HORA": "14:30" }));
        let resolved = resolve_last_movement(&row, 0);
        assert_eq!(resolved.at, Some(dt(2025, 8, 1, 14, 30, 0)));
        assert!(resolved.issues.is_empty());

        let row = record(json!({ "fecha": 45504, "hora": 0.5 }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2024, 7, 31, 12, 0, 0)));

        let row = record(json!({
            "fecha_ultimo_movimiento": "45504",
            "hora_ultimo_movimiento": "0.25",
        }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2024, 7, 31, 6, 0, 0)));
    }

    #[test]
    fn test_split_date_without_usable_time_is_noon() {
        let row = record(json!({ "FECHA": "2025-08-01" }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2025, 8, 1, 12, 0, 0)));

        let row = record(json!({ "FECHA": "2025-08-01", "HORA": "tarde" }));
        let resolved = resolve_last_movement(&row, 4);
        assert_eq!(resolved.at, Some(dt(2025, 8, 1, 12, 0, 0)));
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].field, "HORA");
        assert_eq!(resolved.issues[0].record_index, 4);
    }

    #[test]
    fn test_time_written_in_date_field_is_kept() {
        let row = record(json!({ "FECHA": "2025-08-01 08:45" }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2025, 8, 1, 8, 45, 0)));

        let row = record(json!({ "FECHA": "2025-08-01 08:45", "HORA": "17:00" }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2025, 8, 1, 17, 0, 0)));
    }

    #[test]
    fn test_combined_field_wins_over_split_fields() {
        let row = record(json!({
            "ÚLTIMO MOVIMIENTO": "2025-08-02 09:00",
            "FECHA": "01/08/2025",
            "HORA": "14:30",
        }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2025, 8, 2, 9, 0, 0)));

        let row = record(json!({ "ultimo_movimiento": 45504.5 }));
        assert_eq!(resolve_last_movement(&row, 0).at, Some(dt(2024, 7, 31, 12, 0, 0)));
    }

    #[test]
    fn test_unparsable_combined_falls_back_to_split() {
        let row = record(json!({
            "ULTIMO MOVIMIENTO": "ayer",
            "FECHA": "01/08/2025",
            "HORA": "14:30",
        }));
        let resolved = resolve_last_movement(&row, 2);
        assert_eq!(resolved.at, Some(dt(2025, 8, 1, 14, 30, 0)));
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].field, "ULTIMO MOVIMIENTO");
        assert_eq!(resolved.issues[0].value, "ayer");
    }

    #[test]
    fn test_unresolvable_record_is_unknown_not_error() {
        let row = record(json!({ "FECHA": "not-a-date" }));
        let resolved = resolve_last_movement(&row, 9);
        assert_eq!(resolved.at, None);
        assert_eq!(resolved.issues.len(), 1);
        assert_eq!(resolved.issues[0].value, "not-a-date");

        let row = record(json!({ "FECHA": { "nested": true } }));
        assert_eq!(resolve_last_movement(&row, 0).at, None);

        let empty = record(json!({}));
        let resolved = resolve_last_movement(&empty, 0);
        assert_eq!(resolved.at, None);
        assert!(resolved.issues.is_empty());
    }
}
