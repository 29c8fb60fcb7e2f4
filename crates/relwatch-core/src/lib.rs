//! relwatch core library
//!
//! Correlates app and version rows from a record store, decides which
//! version is current, validates the hierarchy and flips records to
//! released once the App Store serves that version.

pub mod config;
pub mod domain;
pub mod fakes;
pub mod hierarchy;
pub mod latest;
pub mod metrics;
pub mod notify;
pub mod obs;
pub mod ports;
pub mod reconcile;
pub mod report;
pub mod runner;
pub mod telemetry;
pub mod validation;

pub use config::{
    ChildStatusPolicy, FieldNames, ReconcileConfig, RecordSchema, StatusVocabulary,
    DEFAULT_CONCURRENCY, DEFAULT_EXCLUDED_STAGE,
};
pub use domain::{
    ConfigError, FieldMap, FileInfo, LinkInfo, PackageRecord, PackageStatus, ParentReference,
    PortError, PortResult, RawRow, RelwatchError, Result, UserInfo,
};
pub use hierarchy::{exclude_stages, resolve, StagePartition};
pub use latest::{latest_child, latest_version};
pub use notify::{
    dispatch, plan_release_messages, plan_validation_digest, DeliveryAttempt, DeliveryOutcome,
    Mention, NotificationChannelConfig, OutboundMessage, ReleaseEvent,
};
pub use ports::{Messenger, RecordStore, ReleaseLookup, TableRef};
pub use reconcile::{
    decide, ExternalReleaseStatus, FieldMutation, MutationContext, ReconciliationDecision,
    SkipReason,
};
pub use report::{OutcomeKind, RecordOutcome, RunCounts, RunReport};
pub use runner::ReconcileRunner;
pub use telemetry::init_tracing;
pub use validation::{validate, InvalidRecord, ValidationPolicy, ValidationResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
