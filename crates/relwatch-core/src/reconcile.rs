//! Per-record release decision.
//!
//! [`decide`] is a pure function: given a main record, its locally resolved
//! latest version and what the App Store currently reports, it returns a
//! [`ReconciliationDecision`]. The caller performs any writes and
//! notifications the decision asks for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RecordSchema;
use crate::domain::fields::FieldMap;
use crate::domain::record::PackageRecord;

/// What the App Store lookup reported for one app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReleaseStatus {
    pub is_online: bool,
    pub version: Option<String>,
    pub release_date: Option<String>,
    pub current_version_release_date: Option<String>,
    pub display_name: Option<String>,
    pub public_url: Option<String>,
    pub bundle_id: Option<String>,
}

impl ExternalReleaseStatus {
    /// Live in the store with the given version.
    pub fn online(version: impl Into<String>) -> Self {
        Self {
            is_online: true,
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Not (or no longer) in the store.
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Why a record is not applicable for release tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingAppleId,
    MissingVersion,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingAppleId => write!(f, "no Apple ID"),
            SkipReason::MissingVersion => write!(f, "no resolvable version"),
        }
    }
}

/// Partial field update for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMutation {
    pub record_id: String,
    pub fields: FieldMap,
}

/// Outcome of the per-record state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationDecision {
    /// Not applicable: nothing to look up or match against.
    Skip(SkipReason),
    /// Lookup failed, app offline, or the store still serves another version.
    AwaitRelease,
    /// The store serves the local latest version.
    Release {
        /// The version row that shipped, if the record has one.
        target_child: Option<PackageRecord>,
        /// Writes in application order: version row first, then main record.
        mutations: Vec<FieldMutation>,
    },
}

impl ReconciliationDecision {
    pub fn is_release(&self) -> bool {
        matches!(self, ReconciliationDecision::Release { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationDecision::Skip(_) => "skip",
            ReconciliationDecision::AwaitRelease => "await_release",
            ReconciliationDecision::Release { .. } => "release",
        }
    }
}

/// Column names, released value and the run timestamp used to build writes.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub schema: &'a RecordSchema,
    /// Epoch millis stamped into the approval-time column.
    pub run_timestamp_ms: i64,
}

impl MutationContext<'_> {
    fn released(&self, record_id: &str, stamp_approval: bool) -> FieldMutation {
        let names = &self.schema.fields;
        let mut fields = FieldMap::new();
        fields.insert(
            names.status.clone(),
            Value::String(self.schema.statuses.released.clone()),
        );
        if stamp_approval {
            fields.insert(
                names.approval_time.clone(),
                Value::from(self.run_timestamp_ms),
            );
        }
        FieldMutation {
            record_id: record_id.to_string(),
            fields,
        }
    }
}

/// Decide what to do with one main record.
///
/// Missing Apple ID or version always skips, whatever the store says. A
/// missing lookup, an offline app or a version mismatch awaits release.
/// On release the approval time belongs to the version row that shipped:
///
/// - matching child: child gets status and approval time, main gets status;
/// - no children: main gets status and approval time in one write;
/// - children but none matches: main gets status only.
pub fn decide(
    record: &PackageRecord,
    local_latest_version: Option<&str>,
    external: Option<&ExternalReleaseStatus>,
    ctx: &MutationContext<'_>,
) -> ReconciliationDecision {
    if record.apple_id.is_none() {
        return ReconciliationDecision::Skip(SkipReason::MissingAppleId);
    }
    let Some(local) = local_latest_version else {
        return ReconciliationDecision::Skip(SkipReason::MissingVersion);
    };

    let live = external
        .filter(|status| status.is_online)
        .and_then(|status| status.version.as_deref());
    if live != Some(local) {
        return ReconciliationDecision::AwaitRelease;
    }

    let target_child = record
        .children
        .iter()
        .find(|child| child.version.as_deref() == Some(local))
        .cloned();

    let mutations = match &target_child {
        Some(child) => vec![
            ctx.released(&child.id, true),
            ctx.released(&record.id, false),
        ],
        None => vec![ctx.released(&record.id, record.children.is_empty())],
    };

    ReconciliationDecision::Release {
        target_child,
        mutations,
    }
}
