//! Feishu Open Platform client.
//!
//! Handles tenant access tokens and the `{code, msg, data}` response
//! envelope shared by every endpoint. [`bitable`] and [`messenger`] build
//! on top of it.

pub mod bitable;
pub mod messenger;

use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ConnectorError, Result};

pub use bitable::{BitableStore, TableInfo};
pub use messenger::{post_content, FeishuMessenger};

/// Default Feishu Open Platform host.
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens are refreshed this long before Feishu says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

/// Feishu app credentials and endpoint.
#[derive(Debug, Clone)]
pub struct FeishuConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub timeout: Duration,
}

impl FeishuConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point at another host (private deployments, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Standard response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn ensure_ok(&self) -> Result<()> {
        if self.code != 0 {
            return Err(ConnectorError::Api {
                code: self.code,
                msg: self.msg.clone(),
            });
        }
        Ok(())
    }

    fn into_data(self) -> Result<T> {
        self.ensure_ok()?;
        self.data
            .ok_or_else(|| ConnectorError::Decode("response envelope has no data".to_string()))
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expire: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Authenticated Feishu HTTP client.
pub struct FeishuClient {
    config: FeishuConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(config: FeishuConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("relwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Tenant access token, fetched on first use and cached until shortly
    /// before it expires.
    pub async fn tenant_access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!(app_id = %self.config.app_id, "requesting tenant access token");
        let response: TokenResponse = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(&TokenRequest {
                app_id: &self.config.app_id,
                app_secret: &self.config.app_secret,
            })
            .send()
            .await?
            .json()
            .await?;

        if response.code != 0 {
            return Err(ConnectorError::Api {
                code: response.code,
                msg: response.msg,
            });
        }
        if response.tenant_access_token.is_empty() {
            return Err(ConnectorError::Decode(
                "token response has no tenant_access_token".to_string(),
            ));
        }

        let lifetime = Duration::from_secs(response.expire).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: response.tenant_access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.tenant_access_token)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder> {
        let token = self.tenant_access_token().await?;
        Ok(self
            .http
            .request(method, self.url(path))
            .query(query)
            .bearer_auth(token))
    }

    /// Send a request and decode the envelope.
    ///
    /// Feishu reports most failures as a JSON envelope even on 4xx, so the
    /// envelope is read first and the HTTP status only matters when the
    /// body is not an envelope.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(ConnectorError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(e) => Err(ConnectorError::Decode(format!("{e}"))),
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.request(Method::GET, path, query).await?;
        self.execute(request).await?.into_data()
    }

    /// Send a JSON body; only the envelope code is checked.
    pub(crate) async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<()> {
        let request = self.request(method, path, query).await?.json(body);
        self.execute::<serde_json::Value>(request).await?.ensure_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_code_maps_to_api_error() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":99991663,"msg":"token invalid"}"#).expect("parse");
        let err = env.into_data().expect_err("non-zero code");
        assert!(matches!(err, ConnectorError::Api { code: 99991663, .. }));
    }

    #[test]
    fn test_envelope_without_data_is_decode_error() {
        let env: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":0,"msg":"success"}"#).expect("parse");
        assert!(env.ensure_ok().is_ok());
        assert!(matches!(env.into_data(), Err(ConnectorError::Decode(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = FeishuClient::new(
            FeishuConfig::new("cli_a", "secret").with_base_url("http://127.0.0.1:9/"),
        )
        .expect("client");
        assert_eq!(client.url(TOKEN_PATH), format!("http://127.0.0.1:9{TOKEN_PATH}"));
    }
}
