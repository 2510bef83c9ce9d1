use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of a scheduled message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

/// One pending or resolved deferred direct message.
///
/// The serialized field names and the timestamp encoding (ISO-8601 UTC)
/// are shared with other implementations reading the same store file and
/// must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub id: String,
    pub target_user_id: String,
    pub content: String,
    pub send_at: DateTime<Utc>,
    pub creator_id: Option<String>,
    pub status: MessageStatus,
    pub retries: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Store error types
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Encode(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store file error: {}", e),
            StoreError::Encode(e) => write!(f, "store encoding error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Encode(e)
    }
}
