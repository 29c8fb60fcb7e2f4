//! Structured tracing events emitted over a reconciliation run.

use relwatch_core::fakes::{MemoryRecordStore, RecordingMessenger, StaticReleaseLookup};
use relwatch_core::obs::{emit_digest_sent, emit_record_released, emit_run_finished};
use relwatch_core::{
    ExternalReleaseStatus, NotificationChannelConfig, RawRow, ReconcileConfig, ReconcileRunner,
    TableRef,
};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_record_released_logs_target_child() {
    emit_record_released("recB", Some("b2"), "1.2");
    assert!(logs_contain("record.released"));
    assert!(logs_contain("b2"));
}

#[traced_test]
#[test]
fn test_emit_digest_and_finish() {
    emit_digest_sent("oc_all", 3, false);
    emit_run_finished("run-1", 1200, 2, true);
    assert!(logs_contain("digest.sent"));
    assert!(logs_contain("run.finished"));
}

#[tokio::test]
#[traced_test]
async fn test_run_emits_lifecycle_events() {
    let Some(fields) = json!({
        "包名": "Atlas",
        "Apple ID": 42,
        "包状态": "提审中",
        "版本号": "1.0",
    })
    .as_object()
    .cloned() else {
        panic!("object literal");
    };
    let runner = ReconcileRunner::new(
        MemoryRecordStore::new(vec![RawRow::new("recA", fields)]),
        StaticReleaseLookup::new().with_status(42, ExternalReleaseStatus::online("1.0")),
        RecordingMessenger::new(),
        ReconcileConfig::default().with_channels(vec![NotificationChannelConfig::broadcast("oc_all")]),
    )
    .expect("valid config");

    runner
        .run(&TableRef::new("app", "tbl_apps"))
        .await
        .expect("run succeeds");

    assert!(logs_contain("run.started"));
    assert!(logs_contain("record.decided"));
    assert!(logs_contain("record.released"));
    assert!(logs_contain("notification delivered"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("relwatch.run"));
}
