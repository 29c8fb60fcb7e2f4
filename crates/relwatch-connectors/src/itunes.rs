//! App Store status via the iTunes Lookup API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use relwatch_core::{ExternalReleaseStatus, PortResult, ReleaseLookup};

use crate::error::{ConnectorError, Result};

/// Public iTunes endpoint host.
pub const DEFAULT_LOOKUP_BASE_URL: &str = "https://itunes.apple.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COUNTRY: &str = "us";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "resultCount", default)]
    result_count: u64,
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    version: Option<String>,
    track_name: Option<String>,
    release_date: Option<String>,
    current_version_release_date: Option<String>,
    bundle_id: Option<String>,
    track_view_url: Option<String>,
}

impl From<LookupResult> for ExternalReleaseStatus {
    fn from(result: LookupResult) -> Self {
        ExternalReleaseStatus {
            is_online: true,
            version: result.version,
            release_date: result.release_date,
            current_version_release_date: result.current_version_release_date,
            display_name: result.track_name,
            public_url: result.track_view_url,
            bundle_id: result.bundle_id,
        }
    }
}

/// Client for `GET /lookup?id=..&country=..`.
#[derive(Clone)]
pub struct ItunesLookupClient {
    base_url: String,
    country: String,
    http: reqwest::Client,
}

impl ItunesLookupClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_LOOKUP_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            country: DEFAULT_COUNTRY.to_string(),
            http,
        })
    }

    /// Storefront to query.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Current store status of `app_id`. No results means not online.
    pub async fn lookup(&self, app_id: u64) -> Result<ExternalReleaseStatus> {
        let url = format!("{}/lookup", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(url)
            .query(&[("id", app_id.to_string()), ("country", self.country.clone())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LookupResponse = response.json().await?;
        let first = if parsed.result_count == 0 {
            None
        } else {
            parsed.results.into_iter().next()
        };
        match first {
            Some(result) => {
                let status = ExternalReleaseStatus::from(result);
                debug!(
                    app_id,
                    version = status.version.as_deref().unwrap_or("-"),
                    "app is online"
                );
                Ok(status)
            }
            None => {
                debug!(app_id, "app not found in store");
                Ok(ExternalReleaseStatus::offline())
            }
        }
    }
}

#[async_trait]
impl ReleaseLookup for ItunesLookupClient {
    async fn lookup_release_status(
        &self,
        app_id: u64,
    ) -> PortResult<Option<ExternalReleaseStatus>> {
        Ok(Some(self.lookup(app_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_maps_to_status() {
        let parsed: LookupResponse = serde_json::from_str(
            r#"{"resultCount":1,"results":[{"version":"2.3.1","trackName":"Atlas",
                "releaseDate":"2024-01-02T08:00:00Z",
                "currentVersionReleaseDate":"2026-02-01T08:00:00Z",
                "bundleId":"com.acme.atlas","trackViewUrl":"https://apps.apple.com/app/id42",
                "price":0}]}"#,
        )
        .expect("parse lookup response");
        let status =
            ExternalReleaseStatus::from(parsed.results.into_iter().next().expect("one result"));
        assert!(status.is_online);
        assert_eq!(status.version.as_deref(), Some("2.3.1"));
        assert_eq!(status.display_name.as_deref(), Some("Atlas"));
        assert_eq!(status.bundle_id.as_deref(), Some("com.acme.atlas"));
        assert_eq!(
            status.public_url.as_deref(),
            Some("https://apps.apple.com/app/id42")
        );
    }
}
