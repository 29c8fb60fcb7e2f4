//! Latest-version resolution.

use crate::domain::record::PackageRecord;

/// The child whose submission time is the latest.
///
/// Only children with a positive submission time are eligible. On equal
/// submission times the first child in list order wins.
pub fn latest_child(record: &PackageRecord) -> Option<&PackageRecord> {
    let mut latest: Option<(&PackageRecord, i64)> = None;
    for child in &record.children {
        let Some(submitted) = child.submission_time.filter(|t| *t > 0) else {
            continue;
        };
        match latest {
            Some((_, best)) if submitted <= best => {}
            _ => latest = Some((child, submitted)),
        }
    }
    latest.map(|(child, _)| child)
}

/// The version string considered authoritative for release matching.
///
/// Without children this is the record's own version. With children it is
/// the version of the latest submitted child, falling back to the record's
/// own version when no child is eligible or the winner has no version.
pub fn latest_version(record: &PackageRecord) -> Option<&str> {
    if record.children.is_empty() {
        return record.version.as_deref();
    }
    latest_child(record)
        .and_then(|child| child.version.as_deref())
        .or(record.version.as_deref())
}
