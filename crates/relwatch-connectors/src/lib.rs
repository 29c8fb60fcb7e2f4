//! relwatch connectors
//!
//! Concrete collaborators for the reconciliation engine:
//! - [`BitableStore`]: Feishu Bitable rows as a `RecordStore`
//! - [`FeishuMessenger`]: Feishu group chat delivery as a `Messenger`
//! - [`ItunesLookupClient`]: App Store status as a `ReleaseLookup`

pub mod error;
pub mod feishu;
pub mod itunes;
pub mod wiki_url;

pub use error::{ConnectorError, Result, BOT_NOT_IN_CHAT};
pub use feishu::{BitableStore, FeishuClient, FeishuConfig, FeishuMessenger, TableInfo};
pub use itunes::ItunesLookupClient;
pub use wiki_url::{parse_wiki_url, BitableLocation};
