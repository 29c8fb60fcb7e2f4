//! Structured observability hooks for the reconciliation run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via `RunSpan`
//! - Emission functions for lifecycle events: run start, per-record decision,
//!   release, validation digest, write failure and run finish
//!
//! Events are emitted at `info!` level, write failures at `warn!`. Use
//! `RUST_LOG` to filter and `--json` on the binary for JSON lines.

use tracing::instrument::Instrumented;
use tracing::{info, warn, Instrument};

/// Run-scoped tracing span.
///
/// A run spans many `.await` points, so the span is attached to the run
/// future with [`RunSpan::instrument`] rather than entered on the stack.
///
/// ```ignore
/// let report = RunSpan::new(&run_id).instrument(runner.execute(table)).await;
/// // every event inside carries run_id
/// ```
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    /// Create a span tagged with the run id.
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("relwatch.run", run_id = %run_id),
        }
    }

    /// Attach the span to a future.
    pub fn instrument<F: std::future::Future>(self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span)
    }
}

/// Emit event: run started against one table.
pub fn emit_run_started(run_id: &str, table_id: &str, dry_run: bool) {
    info!(event = "run.started", run_id = %run_id, table_id = %table_id, dry_run = dry_run);
}

/// Emit event: one main record was decided.
pub fn emit_record_decided(record_id: &str, decision: &str, version: Option<&str>) {
    info!(
        event = "record.decided",
        record_id = %record_id,
        decision = %decision,
        version = version.unwrap_or("-"),
    );
}

/// Emit event: a record transitioned to released.
pub fn emit_record_released(record_id: &str, target_child: Option<&str>, version: &str) {
    info!(
        event = "record.released",
        record_id = %record_id,
        target_child = target_child.unwrap_or("-"),
        version = %version,
    );
}

/// Emit event: validation digest delivery attempted.
pub fn emit_digest_sent(channel_id: &str, invalid: usize, delivered: bool) {
    info!(
        event = "digest.sent",
        channel_id = %channel_id,
        invalid = invalid,
        delivered = delivered,
    );
}

/// Emit event: a field write failed (warning level).
pub fn emit_write_failed(record_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "record.write_failed", record_id = %record_id, error = %error);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, released: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        released = released,
        success = success,
    );
}
