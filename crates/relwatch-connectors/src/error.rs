//! Error types for relwatch-connectors

use relwatch_core::PortError;
use thiserror::Error;

/// Feishu error code returned when the bot is not a member of the chat.
pub const BOT_NOT_IN_CHAT: i64 = 230002;

/// Errors raised while talking to Feishu or the App Store.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Transport failure: connect, timeout, TLS
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status without a parseable API envelope
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// API envelope with a non-zero code
    #[error("Feishu API error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    Decode(String),

    /// Wiki node points at something other than a Bitable
    #[error("wiki node {token} is a {obj_type}, not a bitable")]
    NotBitable { token: String, obj_type: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Operator hint for well-known API failures.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConnectorError::Api {
                code: BOT_NOT_IN_CHAT,
                ..
            } => Some("the bot is not in this chat; add the app to the group via Settings > Bots"),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ConnectorError::Decode(err.to_string())
        } else {
            ConnectorError::Http(err.to_string())
        }
    }
}

impl From<ConnectorError> for PortError {
    fn from(err: ConnectorError) -> Self {
        let message = match err.hint() {
            Some(hint) => format!("{err} ({hint})"),
            None => err.to_string(),
        };
        match err {
            ConnectorError::Http(_) => PortError::Connectivity(message),
            ConnectorError::Status { status, .. } if status >= 500 || status == 429 => {
                PortError::Connectivity(message)
            }
            ConnectorError::Status { .. }
            | ConnectorError::Api { .. }
            | ConnectorError::NotBitable { .. } => PortError::Rejected(message),
            ConnectorError::Decode(_) | ConnectorError::Json(_) => PortError::Malformed(message),
        }
    }
}

/// Result type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
