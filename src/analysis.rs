//! Order movement analysis
//!
//! One pass over the in-movement orders: normalize fields, resolve the last
//! movement, classify its age and fold the order into every group and total.
//! The result depends only on the input rows and the supplied `now`.

use crate::age;
use crate::datetime;
use crate::eligibility;
use crate::error::Result;
use crate::fields::{NormalizedFields, NO_CARRIER, NO_REGION};
use crate::ingest;
use crate::models::{AnalysisResult, DataQualityIssue, EnrichedOrder, RawOrderRecord};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

/// Normalize one row and compute its age relative to `now`
pub fn enrich_order(
    record: &RawOrderRecord,
    record_index: usize,
    now: NaiveDateTime,
) -> (EnrichedOrder, Vec<DataQualityIssue>) {
    let fields = NormalizedFields::from_record(record);
    let movement = datetime::resolve_last_movement(record, record_index);
    let order_age = age::classify(movement.at, now);

    let order = EnrichedOrder {
        raw: record.clone(),
        calculated_profit: fields.profit(),
        status: fields.status,
        carrier: fields.carrier,
        region: fields.region,
        order_value: fields.order_value,
        shipping_cost: fields.shipping_cost,
        provider_cost: fields.provider_cost,
        last_movement_at: movement.at,
        hours_since: order_age.hours_since,
        days_since: order_age.days_since,
        age_label: order_age.label,
        age_bucket: order_age.bucket,
        age_severity: order_age.severity,
    };
    (order, movement.issues)
}

impl AnalysisResult {
    fn fold(&mut self, order: EnrichedOrder) {
        self.total_value += order.order_value;
        self.total_shipping_cost += order.shipping_cost;
        self.total_provider_cost += order.provider_cost;
        self.potential_profit += order.calculated_profit;

        *self.age_buckets_count.entry(order.age_bucket).or_insert(0) += 1;
        *self.severity_count.entry(order.age_severity).or_insert(0) += 1;

        if order.carrier != NO_CARRIER {
            self.carriers.insert(order.carrier.clone());
        }
        if order.region != NO_REGION {
            self.regions.insert(order.region.clone());
        }

        self.by_status
            .entry(order.status.clone())
            .or_default()
            .push(order.clone());
        self.by_carrier
            .entry(order.carrier.clone())
            .or_default()
            .push(order.clone());
        self.by_region
            .entry(order.region.clone())
            .or_default()
            .push(order.clone());
        self.by_age_bucket
            .entry(order.age_bucket)
            .or_default()
            .push(order.clone());
        self.orders_in_movement.push(order);
    }
}

/// Analyze the orders still in movement as of `now`
pub fn analyze(records: &[RawOrderRecord], now: NaiveDateTime) -> AnalysisResult {
    let mut result = AnalysisResult::empty();

    for (index, record) in eligibility::in_movement(records) {
        let (order, issues) = enrich_order(record, index, now);
        result.data_quality.extend(issues);
        result.fold(order);
    }

    debug!(
        "Analyzed {} records: {} in movement, {} unparsable date values",
        records.len(),
        result.orders_in_movement.len(),
        result.data_quality.len()
    );
    result
}

/// Analyze a JSON document holding a list of records. `null` analyzes as empty.
pub fn analyze_value(value: &Value, now: NaiveDateTime) -> Result<AnalysisResult> {
    let records = ingest::records_from_value(value)?;
    Ok(analyze(&records, now))
}
