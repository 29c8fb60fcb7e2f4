//! Run report: what one reconciliation pass saw and did.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::Result;
use crate::notify::DeliveryAttempt;
use crate::reconcile::SkipReason;
use crate::validation::InvalidRecord;

/// Final state of one main record in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    Skipped { reason: SkipReason },
    AwaitingRelease,
    Released { target_child: Option<String> },
}

/// A field write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub record_id: String,
    pub error: String,
}

/// Per-record outcome, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub record_id: String,
    pub package_name: String,
    pub apple_id: Option<u64>,
    pub local_version: Option<String>,
    /// Version the store reported, when it answered and the app is online.
    pub store_version: Option<String>,
    pub kind: OutcomeKind,
    /// Set when the lookup itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_failures: Vec<WriteFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<DeliveryAttempt>,
}

impl RecordOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self.kind, OutcomeKind::Released { .. })
    }

    pub fn failed_deliveries(&self) -> usize {
        self.deliveries.iter().filter(|a| !a.delivered()).count()
    }
}

/// An invalid record, flattened for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidSummary {
    pub record_id: String,
    pub package_name: String,
    pub errors: Vec<String>,
}

impl From<&InvalidRecord> for InvalidSummary {
    fn from(invalid: &InvalidRecord) -> Self {
        Self {
            record_id: invalid.record.id.clone(),
            package_name: invalid.record.display_name().to_string(),
            errors: invalid.errors.clone(),
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub fetched_rows: usize,
    pub main_records: usize,
    pub excluded_by_stage: usize,
    pub valid: usize,
    pub invalid: usize,
    pub released: usize,
    pub skipped: usize,
    pub awaiting: usize,
    pub failed_writes: usize,
    pub failed_deliveries: usize,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub table_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: RunCounts,
    /// Ids of main records dropped by stage.
    pub excluded: Vec<String>,
    pub invalid: Vec<InvalidSummary>,
    /// Delivery of the validation digest, if one was sent.
    pub digest: Option<DeliveryAttempt>,
    pub outcomes: Vec<RecordOutcome>,
}

impl RunReport {
    /// Fill the outcome-derived counters from `outcomes` and `digest`.
    pub fn tally(&mut self) {
        let counts = &mut self.counts;
        counts.released = 0;
        counts.skipped = 0;
        counts.awaiting = 0;
        counts.failed_writes = 0;
        counts.failed_deliveries = 0;
        for outcome in &self.outcomes {
            match outcome.kind {
                OutcomeKind::Released { .. } => counts.released += 1,
                OutcomeKind::Skipped { .. } => counts.skipped += 1,
                OutcomeKind::AwaitingRelease => counts.awaiting += 1,
            }
            counts.failed_writes += outcome.write_failures.len();
            counts.failed_deliveries += outcome.failed_deliveries();
        }
        if self.digest.as_ref().is_some_and(|d| !d.delivered()) {
            counts.failed_deliveries += 1;
        }
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
