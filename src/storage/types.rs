//! Records persisted by [`SledModerationStore`](super::SledModerationStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const USER_SCHEMA_VERSION: u8 = 1;
pub const MESSAGE_SCHEMA_VERSION: u8 = 1;
pub const BAD_WORD_SCHEMA_VERSION: u8 = 1;
pub const STATISTIC_SCHEMA_VERSION: u8 = 1;

pub type UserId = u64;
pub type MessageId = u64;

/// A chat participant, created the first time one of their lines is seen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub first_seen: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserRecord {
    pub fn new(id: UserId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            first_seen: Utc::now(),
            schema_version: USER_SCHEMA_VERSION,
        }
    }
}

/// One chat line as received. `blocked` is decided once at insert time; `printed`
/// flips after the rendering sink accepts the bitmap. A blocked message is never
/// printed, but a message may be neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub user_id: UserId,
    pub text: String,
    pub printed: bool,
    pub blocked: bool,
    pub received_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl MessageRecord {
    pub fn new(id: MessageId, user_id: UserId, text: &str, blocked: bool) -> Self {
        Self {
            id,
            user_id,
            text: text.to_string(),
            printed: false,
            blocked,
            received_at: Utc::now(),
            schema_version: MESSAGE_SCHEMA_VERSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadWordRecord {
    pub id: u64,
    /// Stored lower-cased.
    pub word: String,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticRecord {
    pub name: String,
    pub value: i64,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}
