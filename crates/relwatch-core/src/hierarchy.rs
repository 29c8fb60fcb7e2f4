//! Hierarchy resolution: flat rows to main records with attached versions.
//!
//! A main record is a row whose status column holds the in-review value and
//! whose parent column points at nothing. Every other row that lists a main
//! record's id in its parent references becomes one of that main record's
//! children. The correlation is a nested scan; tables stay in the low
//! thousands of rows.

use tracing::debug;

use crate::config::{ChildStatusPolicy, RecordSchema};
use crate::domain::record::{PackageRecord, RawRow};

/// Whether `row` qualifies as a main record under `schema`.
pub fn is_main_candidate(row: &RawRow, schema: &RecordSchema) -> bool {
    let fields = &schema.fields;
    row.status_values(&fields.status)
        .iter()
        .any(|v| *v == schema.statuses.in_review)
        && row.has_empty_parent(&fields.parent)
}

/// Group `rows` into main records, each carrying its version rows.
///
/// - A row referencing several main records becomes a child of each.
/// - A row is attached at most once per main record and never to itself.
/// - Rows that reference no main record are dropped.
/// - Output order follows input order, for mains and for children.
pub fn resolve(
    rows: &[RawRow],
    schema: &RecordSchema,
    child_policy: &ChildStatusPolicy,
) -> Vec<PackageRecord> {
    let fields = &schema.fields;

    rows.iter()
        .filter(|row| is_main_candidate(row, schema))
        .map(|main_row| {
            let mut record = PackageRecord::from_row(main_row, schema);
            record.children = rows
                .iter()
                .filter(|row| row.id != main_row.id)
                .filter(|row| row.references_parent(&fields.parent, &main_row.id))
                .filter(|row| child_policy.admits(&row.status_values(&fields.status)))
                .map(|row| PackageRecord::from_row(row, schema))
                .collect();

            debug!(
                record_id = %record.id,
                package = %record.display_name(),
                children = record.children.len(),
                "resolved main record"
            );
            record
        })
        .collect()
}

/// Main records split by stage.
#[derive(Debug, Default)]
pub struct StagePartition {
    pub kept: Vec<PackageRecord>,
    pub excluded: Vec<PackageRecord>,
}

/// Drop main records whose stage is one of `excluded_stages`.
pub fn exclude_stages(records: Vec<PackageRecord>, excluded_stages: &[String]) -> StagePartition {
    let (excluded, kept) = records.into_iter().partition(|record| {
        record
            .stage
            .as_ref()
            .is_some_and(|stage| excluded_stages.contains(stage))
    });
    StagePartition { kept, excluded }
}
