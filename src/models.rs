use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One loosely-typed shipment row as exported by the store backend.
/// No fixed schema: keys drift between accented, plain and legacy lowercase headers.
pub type RawOrderRecord = Map<String, Value>;

/// Elapsed-time bucket since an order last moved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeBucket {
    #[serde(rename = "under12h")]
    Under12h,
    #[serde(rename = "12to24h")]
    From12To24h,
    #[serde(rename = "24to48h")]
    From24To48h,
    #[serde(rename = "48to72h")]
    From48To72h,
    #[serde(rename = "over72h")]
    Over72h,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 6] = [
        AgeBucket::Under12h,
        AgeBucket::From12To24h,
        AgeBucket::From24To48h,
        AgeBucket::From48To72h,
        AgeBucket::Over72h,
        AgeBucket::Unknown,
    ];

    /// Bucket for a non-negative elapsed time. Ranges are lower-inclusive.
    pub fn from_elapsed_hours(hours: f64) -> Self {
        if hours < 12.0 {
            AgeBucket::Under12h
        } else if hours < 24.0 {
            AgeBucket::From12To24h
        } else if hours < 48.0 {
            AgeBucket::From24To48h
        } else if hours < 72.0 {
            AgeBucket::From48To72h
        } else {
            AgeBucket::Over72h
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            AgeBucket::Over72h => Severity::Danger,
            AgeBucket::From48To72h => Severity::Warn,
            AgeBucket::Under12h | AgeBucket::From12To24h | AgeBucket::From24To48h => {
                Severity::Normal
            }
            AgeBucket::Unknown => Severity::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgeBucket::Under12h => "under12h",
            AgeBucket::From12To24h => "12to24h",
            AgeBucket::From24To48h => "24to48h",
            AgeBucket::From48To72h => "48to72h",
            AgeBucket::Over72h => "over72h",
            AgeBucket::Unknown => "unknown",
        }
    }
}

impl From<&str> for AgeBucket {
    fn from(s: &str) -> Self {
        match s {
            "under12h" => AgeBucket::Under12h,
            "12to24h" => AgeBucket::From12To24h,
            "24to48h" => AgeBucket::From24To48h,
            "48to72h" => AgeBucket::From48To72h,
            "over72h" => AgeBucket::Over72h,
            _ => AgeBucket::Unknown,
        }
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic-light alert level derived from the age bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warn,
    Danger,
    None,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Normal,
        Severity::Warn,
        Severity::Danger,
        Severity::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warn => "warn",
            Severity::Danger => "danger",
            Severity::None => "none",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-movement order: the source row with normalized fields and computed age
/// alongside. Source keys serialize at the top level, next to the computed ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedOrder {
    /// Source row, untouched
    #[serde(flatten)]
    pub raw: RawOrderRecord,
    #[serde(rename = "normalizedStatus")]
    pub status: String,
    #[serde(rename = "normalizedCarrier")]
    pub carrier: String,
    #[serde(rename = "normalizedRegion")]
    pub region: String,
    pub order_value: f64,
    pub shipping_cost: f64,
    pub provider_cost: f64,
    pub calculated_profit: f64,
    pub last_movement_at: Option<NaiveDateTime>,
    pub hours_since: Option<u64>,
    pub days_since: Option<u64>,
    pub age_label: String,
    pub age_bucket: AgeBucket,
    pub age_severity: Severity,
}

/// A date/time value that could not be parsed. Never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityIssue {
    /// Position of the row in the input list
    pub record_index: usize,
    pub field: String,
    pub value: String,
}

/// Aggregate result handed to the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub orders_in_movement: Vec<EnrichedOrder>,
    pub total_value: f64,
    pub total_shipping_cost: f64,
    pub total_provider_cost: f64,
    pub potential_profit: f64,
    pub carriers: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub by_status: BTreeMap<String, Vec<EnrichedOrder>>,
    pub by_carrier: BTreeMap<String, Vec<EnrichedOrder>>,
    pub by_region: BTreeMap<String, Vec<EnrichedOrder>>,
    pub by_age_bucket: BTreeMap<AgeBucket, Vec<EnrichedOrder>>,
    pub age_buckets_count: BTreeMap<AgeBucket, usize>,
    pub severity_count: BTreeMap<Severity, usize>,
    pub data_quality: Vec<DataQualityIssue>,
}

impl AnalysisResult {
    /// Canonical empty result: zero totals, empty groups, every bucket counted at zero.
    pub fn empty() -> Self {
        Self {
            orders_in_movement: Vec::new(),
            total_value: 0.0,
            total_shipping_cost: 0.0,
            total_provider_cost: 0.0,
            potential_profit: 0.0,
            carriers: BTreeSet::new(),
            regions: BTreeSet::new(),
            by_status: BTreeMap::new(),
            by_carrier: BTreeMap::new(),
            by_region: BTreeMap::new(),
            by_age_bucket: BTreeMap::new(),
            age_buckets_count: AgeBucket::ALL.iter().map(|b| (*b, 0)).collect(),
            severity_count: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
            data_quality: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders_in_movement.is_empty()
    }

    pub fn bucket_count(&self, bucket: AgeBucket) -> usize {
        self.age_buckets_count.get(&bucket).copied().unwrap_or(0)
    }

    pub fn severity_total(&self, severity: Severity) -> usize {
        self.severity_count.get(&severity).copied().unwrap_or(0)
    }

    /// Orders flagged warn or danger, longest idle first
    pub fn stalled_orders(&self) -> Vec<&EnrichedOrder> {
        let mut stalled: Vec<&EnrichedOrder> = self
            .orders_in_movement
            .iter()
            .filter(|o| matches!(o.age_severity, Severity::Danger | Severity::Warn))
            .collect();
        stalled.sort_by(|a, b| b.hours_since.cmp(&a.hours_since));
        stalled
    }
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::empty()
    }
}
