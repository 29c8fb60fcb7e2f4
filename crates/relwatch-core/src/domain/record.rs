//! Typed app/version records.
//!
//! A [`RawRow`] is exactly what the record store returned. A
//! [`PackageRecord`] is the typed view of one row, built through
//! [`PackageRecord::from_row`] using a [`RecordSchema`] that names the
//! columns. Every field is optional at this stage; completeness is the
//! validation engine's concern.

use serde::{Deserialize, Serialize};

use super::fields::{self, FieldMap};
use crate::config::{RecordSchema, StatusVocabulary};

/// One row as fetched from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub id: String,
    pub fields: FieldMap,
}

impl RawRow {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Every status option present in `column` (scalar or multi-select).
    pub fn status_values(&self, column: &str) -> Vec<String> {
        self.fields
            .get(column)
            .map(fields::string_values)
            .unwrap_or_default()
    }

    /// Whether the row's parent-reference column points at nothing.
    pub fn has_empty_parent(&self, column: &str) -> bool {
        fields::parent_is_empty(self.fields.get(column))
    }

    /// Whether any parent reference in `column` lists `parent_id`.
    pub fn references_parent(&self, column: &str, parent_id: &str) -> bool {
        self.fields
            .get(column)
            .map(fields::parent_references)
            .unwrap_or_default()
            .iter()
            .any(|r| r.record_ids.iter().any(|id| id == parent_id))
    }
}

/// Release status of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum PackageStatus {
    InReview,
    Released,
    Other(String),
}

impl PackageStatus {
    /// Classify raw status options against the configured vocabulary.
    ///
    /// The first option that matches a known status wins; otherwise the
    /// options are kept verbatim (comma-joined) as `Other`.
    pub fn classify(values: &[String], vocabulary: &StatusVocabulary) -> Self {
        for value in values {
            if *value == vocabulary.in_review {
                return PackageStatus::InReview;
            }
            if *value == vocabulary.released {
                return PackageStatus::Released;
            }
        }
        PackageStatus::Other(values.join(","))
    }
}

/// File attachment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_token: String,
    pub name: String,
    pub size: u64,
    pub tmp_url: Option<String>,
    pub mime_type: Option<String>,
    pub url: Option<String>,
}

/// Hyperlink column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub link: String,
    pub text: String,
}

/// Person column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub en_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Pointer from a version row to the main record(s) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub target_table: String,
    pub record_ids: Vec<String>,
    pub raw_text: Option<String>,
    pub text_arr: Vec<String>,
    pub kind: String,
}

impl ParentReference {
    pub(crate) fn text_only(text: String) -> Self {
        Self {
            target_table: String::new(),
            record_ids: Vec::new(),
            raw_text: Some(text),
            text_arr: Vec::new(),
            kind: "text".to_string(),
        }
    }

    /// No record ids and no raw text.
    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty() && self.raw_text.as_deref().map_or(true, str::is_empty)
    }
}

/// Typed app or version record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub package_name: Option<String>,
    pub apple_id: Option<u64>,
    pub version: Option<String>,
    pub status: PackageStatus,
    pub stage: Option<String>,

    pub test_package_name: Option<String>,
    pub production_package_name: Option<String>,
    pub package_size: Option<String>,
    pub product_code: Option<String>,
    pub team: Option<String>,
    pub quarter: Option<String>,
    pub development_days: Option<f64>,
    pub update_description: Option<String>,
    pub notes: Option<String>,

    /// Epoch millis.
    pub submission_time: Option<i64>,
    pub approval_time: Option<i64>,
    pub status_update_time: Option<i64>,
    pub exception_time: Option<i64>,

    pub logo: Vec<FileInfo>,
    pub repository_url: Option<LinkInfo>,
    pub developers: Vec<UserInfo>,
    pub designers: Vec<UserInfo>,
    pub package_senders: Vec<UserInfo>,

    pub parents: Vec<ParentReference>,
    /// Version records. Only main records carry children, one level deep.
    pub children: Vec<PackageRecord>,
}

impl PackageRecord {
    /// Build the typed view of a row. Missing or mistyped columns become
    /// `None`/empty; children are left empty for the resolver to fill.
    pub fn from_row(row: &RawRow, schema: &RecordSchema) -> Self {
        let names = &schema.fields;
        let get = |column: &str| row.fields.get(column);
        let text = |column: &str| get(column).and_then(fields::text_value);
        let millis = |column: &str| get(column).and_then(fields::timestamp_millis);

        Self {
            id: row.id.clone(),
            package_name: text(&names.package_name),
            apple_id: get(&names.apple_id).and_then(fields::app_id),
            version: get(&names.version).and_then(fields::non_empty_text),
            status: PackageStatus::classify(&row.status_values(&names.status), &schema.statuses),
            stage: get(&names.stage).and_then(fields::non_empty_text),

            test_package_name: text(&names.test_package_name),
            production_package_name: text(&names.production_package_name),
            package_size: text(&names.package_size),
            product_code: text(&names.product_code),
            team: text(&names.team),
            quarter: text(&names.quarter),
            development_days: get(&names.development_days).and_then(fields::float_value),
            update_description: text(&names.update_description),
            notes: text(&names.notes),

            submission_time: millis(&names.submission_time),
            approval_time: millis(&names.approval_time),
            status_update_time: millis(&names.status_update_time),
            exception_time: millis(&names.exception_time),

            logo: get(&names.logo).map(fields::files).unwrap_or_default(),
            repository_url: get(&names.repository_url).and_then(fields::link),
            developers: get(&names.developers).map(fields::users).unwrap_or_default(),
            designers: get(&names.designers).map(fields::users).unwrap_or_default(),
            package_senders: get(&names.package_senders).map(fields::users).unwrap_or_default(),

            parents: get(&names.parent)
                .map(fields::parent_references)
                .unwrap_or_default(),
            children: Vec::new(),
        }
    }

    /// Name to show in logs and messages; falls back to the record id.
    pub fn display_name(&self) -> &str {
        self.package_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }
}
