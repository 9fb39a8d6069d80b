//! Order movement analysis for shipment exports
//!
//! Takes loosely-structured order rows, keeps the ones still in transit, works
//! out how long ago each last moved and aggregates value, cost and profit by
//! status, carrier, region and age bucket.

pub mod age;
pub mod analysis;
pub mod datetime;
pub mod eligibility;
pub mod error;
pub mod fields;
pub mod ingest;
pub mod logging;
pub mod models;

pub use analysis::{analyze, analyze_value};
pub use error::{AnalysisError, Result};
pub use models::{
    AgeBucket, AnalysisResult, DataQualityIssue, EnrichedOrder, RawOrderRecord, Severity,
};
