//! Notification planning and best-effort delivery.
//!
//! Planning is pure: a release event plus the channel list yields one
//! [`OutboundMessage`] per channel. Delivery walks the planned messages in
//! order and records an attempt per message; one failed channel never stops
//! the others and nothing is rolled back.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::METRICS;
use crate::ports::Messenger;
use crate::validation::InvalidRecord;

/// Stage text used when a released record has none.
pub const UNKNOWN_STAGE: &str = "unknown";

/// One notification target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannelConfig {
    pub channel_id: String,
    #[serde(default)]
    pub mention_all: bool,
    #[serde(default)]
    pub mention_user_ids: Option<Vec<String>>,
}

impl NotificationChannelConfig {
    /// Broadcast channel that mentions everyone.
    pub fn broadcast(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            mention_all: true,
            mention_user_ids: None,
        }
    }

    /// Channel that mentions specific users.
    pub fn targeted(channel_id: impl Into<String>, user_ids: Vec<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            mention_all: false,
            mention_user_ids: Some(user_ids),
        }
    }

    /// Mention prefix for this channel. `mention_all` wins over the user list;
    /// blank and repeated user ids are dropped.
    pub fn mention(&self) -> Mention {
        if self.mention_all {
            return Mention::All;
        }
        let mut users: Vec<String> = Vec::new();
        for id in self.mention_user_ids.iter().flatten() {
            let id = id.trim();
            if !id.is_empty() && !users.iter().any(|u| u == id) {
                users.push(id.to_string());
            }
        }
        if users.is_empty() {
            Mention::None
        } else {
            Mention::Users(users)
        }
    }
}

/// Who a message should mention. Rendering is the transport's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "user_ids", rename_all = "snake_case")]
pub enum Mention {
    None,
    All,
    Users(Vec<String>),
}

/// A message ready for the messenger port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub text: String,
    pub mention: Mention,
}

/// A version went live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    pub app_name: String,
    pub stage: Option<String>,
    pub version: String,
}

impl ReleaseEvent {
    pub fn text(&self) -> String {
        format!(
            "{} {} V{} passed review and was released",
            self.app_name,
            self.stage.as_deref().unwrap_or(UNKNOWN_STAGE),
            self.version
        )
    }
}

/// Result of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { error: String },
}

/// One attempted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub channel_id: String,
    pub outcome: DeliveryOutcome,
}

impl DeliveryAttempt {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered)
    }
}

/// Plan one release message per channel, in channel order.
///
/// Channels with a blank id are skipped with a warning.
pub fn plan_release_messages(
    configs: &[NotificationChannelConfig],
    event: &ReleaseEvent,
) -> Vec<OutboundMessage> {
    let text = event.text();
    configs
        .iter()
        .filter(|config| {
            let usable = !config.channel_id.trim().is_empty();
            if !usable {
                warn!("notification channel without channel_id, skipping");
            }
            usable
        })
        .map(|config| OutboundMessage {
            channel_id: config.channel_id.clone(),
            text: text.clone(),
            mention: config.mention(),
        })
        .collect()
}

/// Human-readable digest of every invalid record in the batch.
///
/// Starts with a line break so the body sits below the leading mention.
pub fn validation_digest_text(invalid: &[InvalidRecord]) -> String {
    let mut lines = vec![
        " ".to_string(),
        "Data validation warning".to_string(),
        String::new(),
        format!(
            "Found {} app(s) with data problems, please fix:",
            invalid.len()
        ),
        String::new(),
    ];
    for (idx, entry) in invalid.iter().enumerate() {
        lines.push(format!("{}. {}", idx + 1, entry.record.display_name()));
        for error in &entry.errors {
            lines.push(format!("   - {error}"));
        }
        lines.push(format!("   - record id: {}", entry.record.id));
        lines.push(String::new());
    }
    lines.push("Please check the records and fill in the missing information.".to_string());
    lines.join("\n")
}

/// Plan the validation digest.
///
/// Goes to the first channel with `mention_all`, mentioning everyone.
/// Returns `None` when nothing is invalid or no such channel exists.
pub fn plan_validation_digest(
    configs: &[NotificationChannelConfig],
    invalid: &[InvalidRecord],
) -> Option<OutboundMessage> {
    if invalid.is_empty() {
        return None;
    }
    let Some(channel) = configs
        .iter()
        .find(|c| c.mention_all && !c.channel_id.trim().is_empty())
    else {
        warn!(
            invalid = invalid.len(),
            "no mention_all channel configured, skipping validation digest"
        );
        return None;
    };
    Some(OutboundMessage {
        channel_id: channel.channel_id.clone(),
        text: validation_digest_text(invalid),
        mention: Mention::All,
    })
}

/// Deliver planned messages one by one, recording every attempt.
pub async fn deliver<M>(messenger: &M, messages: Vec<OutboundMessage>) -> Vec<DeliveryAttempt>
where
    M: Messenger + ?Sized,
{
    let mut attempts = Vec::with_capacity(messages.len());
    for message in messages {
        let outcome = match messenger.send_message(&message).await {
            Ok(()) => {
                info!(channel_id = %message.channel_id, "notification delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                METRICS.inc_deliveries_failed();
                warn!(channel_id = %message.channel_id, error = %e, "notification delivery failed");
                DeliveryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        attempts.push(DeliveryAttempt {
            channel_id: message.channel_id,
            outcome,
        });
    }
    attempts
}

/// Plan and deliver release notifications for one event.
pub async fn dispatch<M>(
    messenger: &M,
    configs: &[NotificationChannelConfig],
    event: &ReleaseEvent,
) -> Vec<DeliveryAttempt>
where
    M: Messenger + ?Sized,
{
    deliver(messenger, plan_release_messages(configs, event)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordSchema;
    use crate::domain::record::{PackageRecord, RawRow};
    use crate::fakes::RecordingMessenger;

    fn event() -> ReleaseEvent {
        ReleaseEvent {
            app_name: "Atlas".to_string(),
            stage: Some("上架".to_string()),
            version: "1.2".to_string(),
        }
    }

    fn invalid(id: &str, name: Option<&str>, errors: &[&str]) -> InvalidRecord {
        let row = RawRow::new(id, Default::default());
        let mut record = PackageRecord::from_row(&row, &RecordSchema::default());
        record.package_name = name.map(str::to_string);
        InvalidRecord {
            record,
            errors: errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_release_text_template() {
        assert_eq!(event().text(), "Atlas 上架 V1.2 passed review and was released");
        let no_stage = ReleaseEvent {
            stage: None,
            ..event()
        };
        assert_eq!(no_stage.text(), "Atlas unknown V1.2 passed review and was released");
    }

    #[test]
    fn test_plan_follows_config_order_and_mentions() {
        let configs = vec![
            NotificationChannelConfig::broadcast("oc_all"),
            NotificationChannelConfig::targeted(
                "oc_team",
                vec!["ou_1".to_string(), " ".to_string(), "ou_1".to_string(), "ou_2".to_string()],
            ),
            NotificationChannelConfig {
                channel_id: "oc_plain".to_string(),
                ..Default::default()
            },
            NotificationChannelConfig {
                channel_id: "  ".to_string(),
                mention_all: true,
                mention_user_ids: None,
            },
        ];
        let messages = plan_release_messages(&configs, &event());
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].channel_id, "oc_all");
        assert_eq!(messages[0].mention, Mention::All);
        assert_eq!(
            messages[1].mention,
            Mention::Users(vec!["ou_1".to_string(), "ou_2".to_string()])
        );
        assert_eq!(messages[2].mention, Mention::None);
        assert!(messages.iter().all(|m| m.text == event().text()));
    }

    #[test]
    fn test_mention_all_wins_over_user_list() {
        let config = NotificationChannelConfig {
            channel_id: "oc".to_string(),
            mention_all: true,
            mention_user_ids: Some(vec!["ou_1".to_string()]),
        };
        assert_eq!(config.mention(), Mention::All);
    }

    #[test]
    fn test_digest_goes_to_first_mention_all_channel() {
        let configs = vec![
            NotificationChannelConfig::targeted("oc_team", vec!["ou_1".to_string()]),
            NotificationChannelConfig::broadcast("oc_first"),
            NotificationChannelConfig::broadcast("oc_second"),
        ];
        let bad = vec![
            invalid("recA", Some("Atlas"), &["package_name is missing"]),
            invalid("recB", None, &["duplicate version 2.0 shared by child records b1, b2"]),
        ];
        let digest = plan_validation_digest(&configs, &bad).expect("digest planned");
        assert_eq!(digest.channel_id, "oc_first");
        assert_eq!(digest.mention, Mention::All);
        assert!(digest.text.starts_with(" \nData validation warning\n"));
        assert!(digest.text.contains("Found 2 app(s)"));
        assert!(digest.text.contains("1. Atlas"));
        assert!(digest.text.contains("2. recB"));
        assert!(digest.text.contains("   - record id: recA"));
        assert!(digest.text.contains("duplicate version 2.0"));
    }

    #[test]
    fn test_digest_skipped_without_broadcast_channel_or_failures() {
        let targeted = vec![NotificationChannelConfig::targeted("oc_team", vec![])];
        let bad = vec![invalid("recA", Some("Atlas"), &["x"])];
        assert!(plan_validation_digest(&targeted, &bad).is_none());

        let broadcast = vec![NotificationChannelConfig::broadcast("oc_all")];
        assert!(plan_validation_digest(&broadcast, &[]).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_failure() {
        let messenger = RecordingMessenger::new().failing_on("oc_broken");
        let configs = vec![
            NotificationChannelConfig::broadcast("oc_broken"),
            NotificationChannelConfig::broadcast("oc_ok"),
        ];
        let attempts = dispatch(&messenger, &configs, &event()).await;

        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].delivered());
        assert!(attempts[1].delivered());
        assert_eq!(messenger.sent().len(), 1);
        assert_eq!(messenger.sent()[0].channel_id, "oc_ok");
    }
}
