//! Bitable record store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use relwatch_core::{FieldMap, PortResult, RawRow, RecordStore, TableRef};

use super::FeishuClient;
use crate::error::{ConnectorError, Result};

/// Rows requested per page, the API maximum.
pub const PAGE_SIZE: u32 = 500;

/// One table of a Bitable app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableInfo {
    pub table_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct NodeData {
    node: WikiNode,
}

#[derive(Deserialize)]
struct WikiNode {
    #[serde(default)]
    obj_type: String,
    #[serde(default)]
    obj_token: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(
        default = "Vec::new",
        deserialize_with = "null_as_empty",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    items: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct RecordItem {
    record_id: String,
    #[serde(default)]
    fields: FieldMap,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Record store backed by a Feishu Bitable.
pub struct BitableStore {
    client: Arc<FeishuClient>,
}

impl BitableStore {
    pub fn new(client: Arc<FeishuClient>) -> Self {
        Self { client }
    }

    /// Resolve the Bitable app token behind a wiki node.
    pub async fn resolve_app_token(&self, node_token: &str) -> Result<String> {
        let data: NodeData = self
            .client
            .get(
                "/open-apis/wiki/v2/spaces/get_node",
                &[("token", node_token)],
            )
            .await?;
        let node = data.node;
        if node.obj_type != "bitable" {
            return Err(ConnectorError::NotBitable {
                token: node_token.to_string(),
                obj_type: node.obj_type,
            });
        }
        if node.obj_token.is_empty() {
            return Err(ConnectorError::Decode(format!(
                "wiki node {node_token} has no obj_token"
            )));
        }
        info!(node_token, "resolved bitable app token from wiki node");
        Ok(node.obj_token)
    }

    /// Tables of a Bitable app. Doubles as a connection check.
    pub async fn list_tables(&self, app_token: &str) -> Result<Vec<TableInfo>> {
        let path = format!("/open-apis/bitable/v1/apps/{app_token}/tables");
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("page_size", "100")];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }
            let page: Page<TableInfo> = self.client.get(&path, &query).await?;
            tables.extend(page.items);
            match next_page(page.has_more, page.page_token) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(tables)
    }

    /// Every row of the table (or view), following pagination.
    ///
    /// Rows without any field are dropped.
    pub async fn list_records(&self, table: &TableRef) -> Result<Vec<RawRow>> {
        let path = records_path(table);
        let page_size = PAGE_SIZE.to_string();
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("page_size", page_size.as_str())];
            if let Some(view) = table.view_id.as_deref() {
                query.push(("view_id", view));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }

            let page: Page<RecordItem> = self.client.get(&path, &query).await?;
            if page.items.is_empty() {
                break;
            }
            debug!(items = page.items.len(), "fetched record page");
            rows.extend(
                page.items
                    .into_iter()
                    .filter(|item| !item.fields.is_empty())
                    .map(|item| RawRow::new(item.record_id, item.fields)),
            );
            match next_page(page.has_more, page.page_token) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Overwrite the given columns of one record.
    pub async fn update_record(
        &self,
        table: &TableRef,
        record_id: &str,
        fields: &FieldMap,
    ) -> Result<()> {
        let path = format!("{}/{record_id}", records_path(table));
        self.client
            .send_json(Method::PUT, &path, &[], &json!({ "fields": fields }))
            .await?;
        debug!(record_id, "record updated");
        Ok(())
    }
}

fn records_path(table: &TableRef) -> String {
    format!(
        "/open-apis/bitable/v1/apps/{}/tables/{}/records",
        table.app_token, table.table_id
    )
}

fn next_page(has_more: bool, page_token: Option<String>) -> Option<String> {
    if !has_more {
        return None;
    }
    let token = page_token.filter(|t| !t.is_empty());
    if token.is_none() {
        warn!("has_more set without page_token, stopping pagination");
    }
    token
}

#[async_trait]
impl RecordStore for BitableStore {
    async fn fetch_rows(&self, table: &TableRef) -> PortResult<Vec<RawRow>> {
        Ok(self.list_records(table).await?)
    }

    async fn write_fields(
        &self,
        table: &TableRef,
        record_id: &str,
        fields: &FieldMap,
    ) -> PortResult<()> {
        Ok(self.update_record(table, record_id, fields).await?)
    }
}
