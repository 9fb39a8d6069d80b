//! Movement eligibility: which orders are still on the road

use crate::fields::{self, LogicalField};
use crate::models::RawOrderRecord;

/// Uppercase status fragments marking a finished order:
/// delivered, cancelled, returned, rejected
pub const TERMINAL_STATUS_MARKERS: [&str; 4] = ["ENTREG", "CANCEL", "DEVOL", "RECHAZ"];

pub fn is_terminal_status(status: &str) -> bool {
    let upper = status.to_uppercase();
    TERMINAL_STATUS_MARKERS
        .iter()
        .any(|marker| upper.contains(marker))
}

/// Records without a recognizable status are kept
pub fn is_in_movement(record: &RawOrderRecord) -> bool {
    match fields::text(record, LogicalField::Status) {
        Some(status) => !is_terminal_status(&status),
        None => true,
    }
}

/// In-movement records paired with their position in the input
pub fn in_movement(
    records: &[RawOrderRecord],
) -> impl Iterator<Item = (usize, &RawOrderRecord)> + '_ {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| is_in_movement(record))
}
