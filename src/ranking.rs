use crate::scanner::ScanRecord;

/// Sorts by 15-minute change, highest first. Stable, so equal changes keep
/// their discovery order.
pub fn rank(mut records: Vec<ScanRecord>) -> Vec<ScanRecord> {
    records.sort_by(|a, b| b.change_15m.total_cmp(&a.change_15m));
    records
}
