//! Collaborator interfaces consumed by the reconciliation run.
//!
//! - `RecordStore`: row listing and partial field updates
//! - `ReleaseLookup`: the App Store's view of an app
//! - `Messenger`: chat delivery
//!
//! All are async and backend-agnostic. In-memory fakes live in
//! [`crate::fakes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::PortResult;
use crate::domain::fields::FieldMap;
use crate::domain::record::RawRow;
use crate::notify::OutboundMessage;
use crate::reconcile::ExternalReleaseStatus;

/// Coordinates of one table in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Identifies the base (Bitable app) holding the table.
    pub app_token: String,
    pub table_id: String,
    /// Restrict listing to rows visible in this view.
    pub view_id: Option<String>,
}

impl TableRef {
    pub fn new(app_token: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            app_token: app_token.into(),
            table_id: table_id.into(),
            view_id: None,
        }
    }

    pub fn with_view(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }
}

/// Source of rows and sink of field updates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of the table (or view). Pagination is the store's concern.
    async fn fetch_rows(&self, table: &TableRef) -> PortResult<Vec<RawRow>>;

    /// Overwrite the given columns of one row. Must tolerate repeats of the
    /// same update.
    async fn write_fields(
        &self,
        table: &TableRef,
        record_id: &str,
        fields: &FieldMap,
    ) -> PortResult<()>;
}

/// External source of truth for what is live.
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    /// Current store status of `app_id`. `Ok(None)` means the lookup gave no
    /// usable answer.
    async fn lookup_release_status(&self, app_id: u64)
        -> PortResult<Option<ExternalReleaseStatus>>;
}

/// Chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, message: &OutboundMessage) -> PortResult<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    async fn fetch_rows(&self, table: &TableRef) -> PortResult<Vec<RawRow>> {
        (**self).fetch_rows(table).await
    }

    async fn write_fields(
        &self,
        table: &TableRef,
        record_id: &str,
        fields: &FieldMap,
    ) -> PortResult<()> {
        (**self).write_fields(table, record_id, fields).await
    }
}

#[async_trait]
impl<T: ReleaseLookup + ?Sized> ReleaseLookup for std::sync::Arc<T> {
    async fn lookup_release_status(
        &self,
        app_id: u64,
    ) -> PortResult<Option<ExternalReleaseStatus>> {
        (**self).lookup_release_status(app_id).await
    }
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for std::sync::Arc<T> {
    async fn send_message(&self, message: &OutboundMessage) -> PortResult<()> {
        (**self).send_message(message).await
    }
}
