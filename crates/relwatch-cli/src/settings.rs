//! Process settings from environment variables.
//!
//! | Variable                   | Meaning                                           |
//! |----------------------------|---------------------------------------------------|
//! | `ENV`                      | `local` disables every notification channel       |
//! | `FEISHU_APP_ID`            | Feishu app id (required)                          |
//! | `FEISHU_APP_SECRET`        | Feishu app secret (required)                      |
//! | `FEISHU_WIKI_URL`          | wiki link to the app table (required)             |
//! | `FEISHU_CHAT_ID_ALL`       | chat notified with @all, also gets the digest     |
//! | `FEISHU_CHAT_ID_TEAM`      | chat notified with user mentions (needs users)    |
//! | `FEISHU_MENTION_USERS`     | comma-separated user ids for the team chat        |
//! | `RELWATCH_EXCLUDED_STAGES` | comma-separated stages to skip (default `五图`)    |
//! | `RELWATCH_CHILD_STATUSES`  | `all`, or comma-separated statuses for versions   |
//! | `RELWATCH_CONCURRENCY`     | records reconciled at once (default 4)            |

use relwatch_connectors::{parse_wiki_url, BitableLocation};
use relwatch_core::{ChildStatusPolicy, ConfigError, NotificationChannelConfig, ReconcileConfig};

const REQUIRED: [&str; 3] = ["FEISHU_APP_ID", "FEISHU_APP_SECRET", "FEISHU_WIKI_URL"];

/// Settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub app_id: String,
    pub app_secret: String,
    pub wiki_url: String,
    pub location: BitableLocation,
    pub table_id: String,
    pub chat_id_all: Option<String>,
    pub chat_id_team: Option<String>,
    pub mention_users: Vec<String>,
    pub excluded_stages: Option<Vec<String>>,
    pub child_policy: Option<ChildStatusPolicy>,
    pub concurrency: Option<usize>,
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `get`. Blank values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<String> = REQUIRED
            .into_iter()
            .filter(|&key| var(key).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let app_id = var("FEISHU_APP_ID").unwrap_or_default();
        let app_secret = var("FEISHU_APP_SECRET").unwrap_or_default();
        let wiki_url = var("FEISHU_WIKI_URL").unwrap_or_default();

        let location = parse_wiki_url(&wiki_url).ok_or_else(|| {
            ConfigError::invalid(
                "FEISHU_WIKI_URL",
                "expected https://<host>/wiki/<node>?table=<id>",
            )
        })?;
        let table_id = location.table_id.clone().ok_or_else(|| {
            ConfigError::invalid("FEISHU_WIKI_URL", "link has no table parameter")
        })?;

        let child_policy = var("RELWATCH_CHILD_STATUSES")
            .map(|raw| {
                if raw.eq_ignore_ascii_case("all") {
                    return Ok(ChildStatusPolicy::AttachAll);
                }
                let allowed = comma_list(&raw);
                if allowed.is_empty() {
                    return Err(ConfigError::invalid(
                        "RELWATCH_CHILD_STATUSES",
                        "expected `all` or at least one status",
                    ));
                }
                Ok(ChildStatusPolicy::AllowList(allowed))
            })
            .transpose()?;

        let concurrency = var("RELWATCH_CONCURRENCY")
            .map(|raw| {
                raw.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        ConfigError::invalid("RELWATCH_CONCURRENCY", "expected a positive integer")
                    })
            })
            .transpose()?;

        Ok(Self {
            environment: var("ENV").unwrap_or_else(|| "production".to_string()),
            app_id,
            app_secret,
            wiki_url,
            location,
            table_id,
            chat_id_all: var("FEISHU_CHAT_ID_ALL"),
            chat_id_team: var("FEISHU_CHAT_ID_TEAM"),
            mention_users: var("FEISHU_MENTION_USERS")
                .map(|raw| comma_list(&raw))
                .unwrap_or_default(),
            // Present but blank disables stage exclusion.
            excluded_stages: get("RELWATCH_EXCLUDED_STAGES").map(|raw| comma_list(&raw)),
            child_policy,
            concurrency,
        })
    }

    pub fn is_local(&self) -> bool {
        self.environment.eq_ignore_ascii_case("local")
    }

    /// Notification channels in delivery order. Empty when running locally.
    ///
    /// The team chat needs both a chat id and at least one user to mention.
    pub fn channels(&self) -> Vec<NotificationChannelConfig> {
        if self.is_local() {
            return Vec::new();
        }
        let mut channels = Vec::new();
        if let Some(chat) = &self.chat_id_all {
            channels.push(NotificationChannelConfig::broadcast(chat.clone()));
        }
        match &self.chat_id_team {
            Some(chat) if !self.mention_users.is_empty() => {
                channels.push(NotificationChannelConfig::targeted(
                    chat.clone(),
                    self.mention_users.clone(),
                ));
            }
            _ => {}
        }
        channels
    }

    /// Engine configuration, starting from the defaults.
    pub fn reconcile_config(&self, dry_run: bool) -> ReconcileConfig {
        let mut config = ReconcileConfig::default()
            .with_channels(self.channels())
            .with_dry_run(dry_run);
        if let Some(stages) = &self.excluded_stages {
            config.excluded_stages = stages.clone();
        }
        if let Some(policy) = &self.child_policy {
            config.child_policy = policy.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config
    }
}
