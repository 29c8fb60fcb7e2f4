//! In-memory fakes for the collaborator ports (testing only)
//!
//! Provides `MemoryRecordStore`, `StaticReleaseLookup`, and
//! `RecordingMessenger` that satisfy the port contracts without any network.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{PortError, PortResult};
use crate::domain::fields::FieldMap;
use crate::domain::record::RawRow;
use crate::notify::OutboundMessage;
use crate::ports::{Messenger, RecordStore, ReleaseLookup, TableRef};
use crate::reconcile::ExternalReleaseStatus;

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// Row store backed by a `Vec<RawRow>`. Writes are merged into the stored
/// rows and also journaled for assertions.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: Mutex<Vec<RawRow>>,
    writes: Mutex<Vec<(String, FieldMap)>>,
    fail_fetch: bool,
    failing_records: HashSet<String>,
}

impl MemoryRecordStore {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Every fetch fails with a connectivity error.
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Writes to `record_id` fail with a connectivity error.
    pub fn failing_writes_to(mut self, record_id: &str) -> Self {
        self.failing_records.insert(record_id.to_string());
        self
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(String, FieldMap)> {
        self.writes.lock().unwrap().clone()
    }

    /// Current stored row.
    pub fn row(&self, record_id: &str) -> Option<RawRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_rows(&self, _table: &TableRef) -> PortResult<Vec<RawRow>> {
        if self.fail_fetch {
            return Err(PortError::Connectivity("record store unreachable".to_string()));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn write_fields(
        &self,
        _table: &TableRef,
        record_id: &str,
        fields: &FieldMap,
    ) -> PortResult<()> {
        if self.failing_records.contains(record_id) {
            return Err(PortError::Connectivity(format!(
                "write to {record_id} timed out"
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| PortError::Rejected(format!("record {record_id} not found")))?;
        for (key, value) in fields {
            row.fields.insert(key.clone(), value.clone());
        }
        self.writes
            .lock()
            .unwrap()
            .push((record_id.to_string(), fields.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticReleaseLookup
// ---------------------------------------------------------------------------

/// Lookup answering from a fixed table. Unknown ids yield `Ok(None)`.
#[derive(Debug, Default)]
pub struct StaticReleaseLookup {
    statuses: HashMap<u64, ExternalReleaseStatus>,
    failing: HashSet<u64>,
    calls: Mutex<Vec<u64>>,
}

impl StaticReleaseLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, app_id: u64, status: ExternalReleaseStatus) -> Self {
        self.statuses.insert(app_id, status);
        self
    }

    /// Lookups of `app_id` fail with a connectivity error.
    pub fn failing_for(mut self, app_id: u64) -> Self {
        self.failing.insert(app_id);
        self
    }

    /// App ids looked up so far, in call order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseLookup for StaticReleaseLookup {
    async fn lookup_release_status(
        &self,
        app_id: u64,
    ) -> PortResult<Option<ExternalReleaseStatus>> {
        self.calls.lock().unwrap().push(app_id);
        if self.failing.contains(&app_id) {
            return Err(PortError::Connectivity(format!("lookup {app_id} timed out")));
        }
        Ok(self.statuses.get(&app_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// RecordingMessenger
// ---------------------------------------------------------------------------

/// Messenger that keeps every delivered message.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<OutboundMessage>>,
    failing_channels: HashSet<String>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to `channel_id` fail.
    pub fn failing_on(mut self, channel_id: &str) -> Self {
        self.failing_channels.insert(channel_id.to_string());
        self
    }

    /// Delivered messages, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, message: &OutboundMessage) -> PortResult<()> {
        if self.failing_channels.contains(&message.channel_id) {
            return Err(PortError::Rejected(format!(
                "bot is not a member of {}",
                message.channel_id
            )));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
