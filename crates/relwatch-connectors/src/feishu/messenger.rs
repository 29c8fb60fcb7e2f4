//! Feishu IM messenger: rich-text `post` messages to group chats.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use relwatch_core::{Mention, Messenger, OutboundMessage, PortResult};

use super::FeishuClient;
use crate::error::Result;

const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";

#[derive(Serialize)]
struct CreateMessage<'a> {
    receive_id: &'a str,
    msg_type: &'static str,
    /// JSON-encoded post body.
    content: String,
    /// Deduplication key.
    uuid: String,
}

fn at(user_id: &str) -> [Value; 2] {
    [
        json!({ "tag": "at", "user_id": user_id }),
        json!({ "tag": "text", "text": " " }),
    ]
}

/// Build the `post` content for a message: mentions first, then the text
/// in one paragraph. Line breaks inside the text are kept as-is.
pub fn post_content(message: &OutboundMessage) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match &message.mention {
        Mention::None => {}
        Mention::All => parts.extend(at("all")),
        Mention::Users(ids) => {
            for id in ids {
                parts.extend(at(id));
            }
        }
    }
    parts.push(json!({ "tag": "text", "text": message.text }));
    json!({
        "zh_cn": {
            "title": "",
            "content": [parts],
        }
    })
}

/// Messenger delivering to Feishu group chats by chat id.
pub struct FeishuMessenger {
    client: Arc<FeishuClient>,
}

impl FeishuMessenger {
    pub fn new(client: Arc<FeishuClient>) -> Self {
        Self { client }
    }

    /// Post one message.
    pub async fn post(&self, message: &OutboundMessage) -> Result<()> {
        let body = CreateMessage {
            receive_id: &message.channel_id,
            msg_type: "post",
            content: post_content(message).to_string(),
            uuid: Uuid::new_v4().to_string(),
        };
        self.client
            .send_json(
                Method::POST,
                MESSAGES_PATH,
                &[("receive_id_type", "chat_id")],
                &body,
            )
            .await
    }
}

#[async_trait]
impl Messenger for FeishuMessenger {
    async fn send_message(&self, message: &OutboundMessage) -> PortResult<()> {
        match self.post(message).await {
            Ok(()) => {
                let mentions = match &message.mention {
                    Mention::None => 0,
                    Mention::All => 1,
                    Mention::Users(ids) => ids.len(),
                };
                info!(channel_id = %message.channel_id, mentions, "feishu message sent");
                Ok(())
            }
            Err(e) => {
                if let Some(hint) = e.hint() {
                    warn!(channel_id = %message.channel_id, hint, "feishu message rejected");
                }
                Err(e.into())
            }
        }
    }
}
