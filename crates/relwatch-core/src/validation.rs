//! Completeness and consistency checks for main records.
//!
//! [`validate`] runs every check and accumulates failures; it never returns
//! early and never errors. The resulting strings go straight into the
//! validation digest posted to chat, so they are written for people.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::record::PackageRecord;

/// Knobs for checks whose severity is a business decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// When `false` (the default) a missing Apple ID passes validation and
    /// the record is skipped at decision time instead.
    pub require_apple_id: bool,
}

/// Verdict for one main record, children included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a main record and its children.
pub fn validate(record: &PackageRecord, policy: &ValidationPolicy) -> ValidationResult {
    let mut errors = Vec::new();

    if record
        .package_name
        .as_deref()
        .map_or(true, |name| name.trim().is_empty())
    {
        errors.push("package_name is missing".to_string());
    }

    if policy.require_apple_id && record.apple_id.is_none() {
        errors.push("apple_id is missing".to_string());
    }

    for child in &record.children {
        if child.version.is_none() {
            errors.push(format!("child record {} is missing version", child.id));
        }
    }

    let mut by_version: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for child in &record.children {
        if let Some(version) = child.version.as_deref() {
            by_version.entry(version).or_default().push(child.id.as_str());
        }
    }
    // Report duplicates in first-seen order rather than version order.
    let mut duplicates: Vec<(&str, Vec<&str>)> = by_version
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    duplicates.sort_by_key(|(_, ids)| {
        record
            .children
            .iter()
            .position(|c| c.id == ids[0])
            .unwrap_or(usize::MAX)
    });
    for (version, ids) in duplicates {
        errors.push(format!(
            "duplicate version {} shared by child records {}",
            version,
            ids.join(", ")
        ));
    }

    ValidationResult::from_errors(errors)
}

/// A main record that failed validation, with the reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub record: PackageRecord,
    pub errors: Vec<String>,
}

/// Split a batch into valid records and invalid records with their errors.
pub fn partition(
    records: Vec<PackageRecord>,
    policy: &ValidationPolicy,
) -> (Vec<PackageRecord>, Vec<InvalidRecord>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for record in records {
        let result = validate(&record, policy);
        if result.is_valid {
            valid.push(record);
        } else {
            invalid.push(InvalidRecord {
                record,
                errors: result.errors,
            });
        }
    }
    (valid, invalid)
}
