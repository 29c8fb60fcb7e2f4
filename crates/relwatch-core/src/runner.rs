//! One reconciliation pass over a table.
//!
//! Pipeline: fetch rows, resolve main records, drop excluded stages, split
//! valid from invalid, send the validation digest, then reconcile each valid
//! record (lookup, decide, write back, notify) with bounded concurrency.
//! Results come back in input order regardless of completion order.
//!
//! Only a failed fetch aborts the pass. Lookup failures leave the record
//! waiting; write and delivery failures are logged, counted and reported.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::domain::error::{RelwatchError, Result};
use crate::domain::record::PackageRecord;
use crate::hierarchy::{exclude_stages, resolve, StagePartition};
use crate::latest::latest_version;
use crate::metrics::METRICS;
use crate::notify::{deliver, dispatch, plan_validation_digest, DeliveryAttempt, ReleaseEvent};
use crate::obs::{
    emit_digest_sent, emit_record_decided, emit_record_released, emit_run_finished,
    emit_run_started, emit_write_failed, RunSpan,
};
use crate::ports::{Messenger, RecordStore, ReleaseLookup, TableRef};
use crate::reconcile::{decide, MutationContext, ReconciliationDecision};
use crate::report::{InvalidSummary, OutcomeKind, RecordOutcome, RunCounts, RunReport, WriteFailure};
use crate::validation::{partition, InvalidRecord};

/// Drives reconciliation passes against one set of collaborators.
pub struct ReconcileRunner<S, L, M> {
    store: S,
    lookup: L,
    messenger: M,
    config: ReconcileConfig,
}

impl<S, L, M> ReconcileRunner<S, L, M>
where
    S: RecordStore,
    L: ReleaseLookup,
    M: Messenger,
{
    /// Build a runner. Fails if the configuration cannot drive a run.
    pub fn new(store: S, lookup: L, messenger: M, config: ReconcileConfig) -> Result<Self> {
        config.check()?;
        Ok(Self {
            store,
            lookup,
            messenger,
            config,
        })
    }

    /// Run one pass stamped with the current time.
    pub async fn run(&self, table: &TableRef) -> Result<RunReport> {
        self.run_at(table, Utc::now()).await
    }

    /// Run one pass, stamping approval times with `now`.
    pub async fn run_at(&self, table: &TableRef, now: DateTime<Utc>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        RunSpan::new(&run_id.to_string())
            .instrument(self.execute(run_id, table, now))
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        table: &TableRef,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let run_label = run_id.to_string();
        emit_run_started(&run_label, &table.table_id, self.config.dry_run);

        let rows = match self.store.fetch_rows(table).await {
            Ok(rows) => rows,
            Err(e) => {
                emit_run_finished(&run_label, 0, 0, false);
                return Err(RelwatchError::Fetch(e));
            }
        };
        info!(rows = rows.len(), "fetched rows");

        let mains = resolve(&rows, &self.config.schema, &self.config.child_policy);
        let main_records = mains.len();

        let StagePartition { kept, excluded } =
            exclude_stages(mains, &self.config.excluded_stages);
        for record in &excluded {
            info!(
                record_id = %record.id,
                stage = record.stage.as_deref().unwrap_or_default(),
                "excluded by stage"
            );
        }

        let (valid, invalid) = partition(kept, &self.config.validation_policy());
        for entry in &invalid {
            warn!(record_id = %entry.record.id, errors = ?entry.errors, "record failed validation");
        }

        let digest = self.send_digest(&invalid).await;

        let run_ts = now.timestamp_millis();
        let valid_count = valid.len();
        let outcomes: Vec<RecordOutcome> = stream::iter(valid)
            .map(|record| self.reconcile_record(table, record, run_ts))
            .buffered(self.config.concurrency)
            .collect()
            .await;

        let mut report = RunReport {
            run_id,
            table_id: table.table_id.clone(),
            dry_run: self.config.dry_run,
            started_at: now,
            finished_at: Utc::now(),
            counts: RunCounts {
                fetched_rows: rows.len(),
                main_records,
                excluded_by_stage: excluded.len(),
                valid: valid_count,
                invalid: invalid.len(),
                ..RunCounts::default()
            },
            excluded: excluded.into_iter().map(|r| r.id).collect(),
            invalid: invalid.iter().map(InvalidSummary::from).collect(),
            digest,
            outcomes,
        };
        report.tally();

        emit_run_finished(&run_label, report.duration_ms(), report.counts.released, true);
        METRICS.flush();
        Ok(report)
    }

    async fn send_digest(&self, invalid: &[InvalidRecord]) -> Option<DeliveryAttempt> {
        let message = plan_validation_digest(&self.config.channels, invalid)?;
        if self.config.dry_run {
            info!(channel_id = %message.channel_id, "dry run, validation digest not sent");
            return None;
        }
        let attempt = deliver(&self.messenger, vec![message]).await.pop()?;
        emit_digest_sent(&attempt.channel_id, invalid.len(), attempt.delivered());
        Some(attempt)
    }

    async fn reconcile_record(
        &self,
        table: &TableRef,
        record: PackageRecord,
        run_ts: i64,
    ) -> RecordOutcome {
        let local = latest_version(&record).map(str::to_string);

        let mut lookup_error = None;
        let external = match (record.apple_id, local.as_deref()) {
            (Some(app_id), Some(_)) => {
                METRICS.inc_lookups();
                match self.lookup.lookup_release_status(app_id).await {
                    Ok(status) => status,
                    Err(e) => {
                        METRICS.inc_lookups_failed();
                        warn!(record_id = %record.id, app_id, error = %e, "release lookup failed");
                        lookup_error = Some(e.to_string());
                        None
                    }
                }
            }
            _ => None,
        };

        let ctx = MutationContext {
            schema: &self.config.schema,
            run_timestamp_ms: run_ts,
        };
        let decision = decide(&record, local.as_deref(), external.as_ref(), &ctx);
        emit_record_decided(&record.id, decision.label(), local.as_deref());

        let store_version = external
            .filter(|status| status.is_online)
            .and_then(|status| status.version);

        let mut outcome = RecordOutcome {
            record_id: record.id.clone(),
            package_name: record.display_name().to_string(),
            apple_id: record.apple_id,
            local_version: local.clone(),
            store_version,
            kind: OutcomeKind::AwaitingRelease,
            lookup_error,
            write_failures: Vec::new(),
            deliveries: Vec::new(),
        };

        match decision {
            ReconciliationDecision::Skip(reason) => {
                info!(record_id = %record.id, %reason, "record skipped");
                outcome.kind = OutcomeKind::Skipped { reason };
            }
            ReconciliationDecision::AwaitRelease => {
                debug!(
                    record_id = %record.id,
                    local = local.as_deref().unwrap_or_default(),
                    store = outcome.store_version.as_deref().unwrap_or("-"),
                    "waiting for release"
                );
            }
            ReconciliationDecision::Release {
                target_child,
                mutations,
            } => {
                let version = local.unwrap_or_default();
                let target_id = target_child.as_ref().map(|c| c.id.clone());
                emit_record_released(&record.id, target_id.as_deref(), &version);
                METRICS.inc_released();
                outcome.kind = OutcomeKind::Released {
                    target_child: target_id,
                };

                if self.config.dry_run {
                    info!(
                        record_id = %record.id,
                        writes = mutations.len(),
                        "dry run, no writes or notifications"
                    );
                    return outcome;
                }

                for mutation in &mutations {
                    if let Err(e) = self
                        .store
                        .write_fields(table, &mutation.record_id, &mutation.fields)
                        .await
                    {
                        METRICS.inc_writes_failed();
                        emit_write_failed(&mutation.record_id, &e);
                        outcome.write_failures.push(WriteFailure {
                            record_id: mutation.record_id.clone(),
                            error: e.to_string(),
                        });
                    }
                }

                let event = ReleaseEvent {
                    app_name: record.display_name().to_string(),
                    stage: record.stage.clone(),
                    version,
                };
                outcome.deliveries = dispatch(&self.messenger, &self.config.channels, &event).await;
            }
        }
        outcome
    }
}
