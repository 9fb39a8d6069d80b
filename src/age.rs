//! Time since last movement and its alert classification

use crate::models::{AgeBucket, Severity};
use chrono::NaiveDateTime;
use tracing::debug;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAge {
    pub elapsed_hours: Option<f64>,
    pub hours_since: Option<u64>,
    pub days_since: Option<u64>,
    pub label: String,
    pub bucket: AgeBucket,
    pub severity: Severity,
}

impl OrderAge {
    pub fn unknown() -> Self {
        Self {
            elapsed_hours: None,
            hours_since: None,
            days_since: None,
            label: String::new(),
            bucket: AgeBucket::Unknown,
            severity: AgeBucket::Unknown.severity(),
        }
    }
}

/// Hours between `at` and `now`. Timestamps after `now` count as zero.
pub fn elapsed_hours(at: NaiveDateTime, now: NaiveDateTime) -> f64 {
    let effective = if at > now {
        debug!("Last movement {} is after now {}, clamping", at, now);
        now
    } else {
        at
    };
    (now - effective).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// "5h" below one day, "2d 3h" from then on
pub fn age_label(hours: f64) -> String {
    if hours < HOURS_PER_DAY {
        format!("{}h", hours.floor() as u64)
    } else {
        let days = (hours / HOURS_PER_DAY).floor() as u64;
        let rest = (hours % HOURS_PER_DAY).floor() as u64;
        format!("{}d {}h", days, rest)
    }
}

pub fn classify(last_movement: Option<NaiveDateTime>, now: NaiveDateTime) -> OrderAge {
    let Some(at) = last_movement else {
        return OrderAge::unknown();
    };

    let hours = elapsed_hours(at, now);
    let bucket = AgeBucket::from_elapsed_hours(hours);
    OrderAge {
        elapsed_hours: Some(hours),
        hours_since: Some(hours.floor() as u64),
        days_since: Some((hours / HOURS_PER_DAY).floor() as u64),
        label: age_label(hours),
        bucket,
        severity: bucket.severity(),
    }
}
