//! Reconciliation configuration.
//!
//! Column names, status vocabulary, child filtering, stage exclusion and
//! notification channels are all explicit values passed into the resolver,
//! validator and dispatcher. Defaults match the production Bitable schema.

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::notify::NotificationChannelConfig;
use crate::validation::ValidationPolicy;

// ---------------------------------------------------------------------------
// Record schema
// ---------------------------------------------------------------------------

/// Column names of the app table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub package_name: String,
    pub apple_id: String,
    pub status: String,
    pub version: String,
    pub stage: String,
    pub parent: String,
    pub submission_time: String,
    /// Written with the run timestamp when a version ships.
    pub approval_time: String,
    pub status_update_time: String,
    pub exception_time: String,
    pub test_package_name: String,
    pub production_package_name: String,
    pub package_size: String,
    pub product_code: String,
    pub team: String,
    pub quarter: String,
    pub development_days: String,
    pub update_description: String,
    pub notes: String,
    pub logo: String,
    pub repository_url: String,
    pub developers: String,
    pub designers: String,
    pub package_senders: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            package_name: "包名".to_string(),
            apple_id: "Apple ID".to_string(),
            status: "包状态".to_string(),
            version: "版本号".to_string(),
            stage: "阶段".to_string(),
            parent: "父记录".to_string(),
            submission_time: "提审时间".to_string(),
            approval_time: "过审时间".to_string(),
            status_update_time: "包状态更新时间".to_string(),
            exception_time: "异常时间".to_string(),
            test_package_name: "测试包名".to_string(),
            production_package_name: "生产包名".to_string(),
            package_size: "包Size".to_string(),
            product_code: "商品code".to_string(),
            team: "团队".to_string(),
            quarter: "所属季度".to_string(),
            development_days: "开发人日".to_string(),
            update_description: "更新文案".to_string(),
            notes: "备注".to_string(),
            logo: "logo".to_string(),
            repository_url: "仓库地址".to_string(),
            developers: "开发人员".to_string(),
            designers: "设计人员".to_string(),
            package_senders: "发包人员".to_string(),
        }
    }
}

/// Status option values as stored in the status column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub in_review: String,
    pub released: String,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            in_review: "提审中".to_string(),
            released: "已发布".to_string(),
        }
    }
}

/// Everything needed to turn a raw row into a typed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSchema {
    pub fields: FieldNames,
    pub statuses: StatusVocabulary,
}

// ---------------------------------------------------------------------------
// Child status policy
// ---------------------------------------------------------------------------

/// Which version rows get attached to a main record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "statuses", rename_all = "snake_case")]
pub enum ChildStatusPolicy {
    /// Attach every row that points at the main record.
    AttachAll,
    /// Attach only rows carrying one of these status values.
    AllowList(Vec<String>),
}

impl ChildStatusPolicy {
    /// Allow-list of in-review and released versions.
    pub fn in_review_or_released(statuses: &StatusVocabulary) -> Self {
        ChildStatusPolicy::AllowList(vec![statuses.in_review.clone(), statuses.released.clone()])
    }

    /// Whether a row with these status values may become a child.
    pub fn admits(&self, values: &[String]) -> bool {
        match self {
            ChildStatusPolicy::AttachAll => true,
            ChildStatusPolicy::AllowList(allowed) => values.iter().any(|v| allowed.contains(v)),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconcileConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Stage value whose records never take part in release tracking.
pub const DEFAULT_EXCLUDED_STAGE: &str = "五图";

/// Full configuration of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub schema: RecordSchema,
    pub child_policy: ChildStatusPolicy,
    /// Main records in any of these stages are dropped before validation.
    pub excluded_stages: Vec<String>,
    /// Treat a missing Apple ID as a validation error instead of a skip.
    pub require_apple_id: bool,
    /// Delivery order of release notifications.
    pub channels: Vec<NotificationChannelConfig>,
    /// Upper bound on records reconciled at once.
    pub concurrency: usize,
    /// Decide and report, but write nothing and send nothing.
    pub dry_run: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let schema = RecordSchema::default();
        let child_policy = ChildStatusPolicy::in_review_or_released(&schema.statuses);
        Self {
            schema,
            child_policy,
            excluded_stages: vec![DEFAULT_EXCLUDED_STAGE.to_string()],
            require_apple_id: false,
            channels: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

impl ReconcileConfig {
    pub fn with_channels(mut self, channels: Vec<NotificationChannelConfig>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_child_policy(mut self, policy: ChildStatusPolicy) -> Self {
        self.child_policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            require_apple_id: self.require_apple_id,
        }
    }

    /// Reject configurations that cannot drive a run.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }

        let statuses = &self.schema.statuses;
        if statuses.in_review.is_empty() || statuses.released.is_empty() {
            return Err(ConfigError::invalid(
                "statuses",
                "in_review and released values must be non-empty",
            ));
        }
        if statuses.in_review == statuses.released {
            return Err(ConfigError::invalid(
                "statuses",
                "in_review and released values must differ",
            ));
        }

        let fields = &self.schema.fields;
        for (key, name) in [
            ("fields.status", &fields.status),
            ("fields.parent", &fields.parent),
            ("fields.version", &fields.version),
            ("fields.approval_time", &fields.approval_time),
        ] {
            if name.is_empty() {
                return Err(ConfigError::invalid(key, "column name must be non-empty"));
            }
        }

        if let ChildStatusPolicy::AllowList(allowed) = &self.child_policy {
            if allowed.is_empty() {
                return Err(ConfigError::invalid(
                    "child_policy",
                    "allow list must name at least one status",
                ));
            }
        }

        Ok(())
    }
}
