use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::utils::fs::atomic_write;

use super::types::{MessageStatus, ScheduledMessage, StoreError};

/// Flat-file store for deferred direct messages.
///
/// The whole collection round-trips through a single JSON array on every
/// operation: read, decode, mutate in memory, encode, write. The mutex
/// serializes those cycles so concurrent schedulers cannot lose updates.
pub struct ScheduledMessageStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScheduledMessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create a pending record and persist it. Callers are responsible for
    /// validating that `send_at` is a real timestamp.
    pub async fn schedule(
        &self,
        target_user_id: &str,
        content: &str,
        send_at: DateTime<Utc>,
        creator_id: Option<&str>,
    ) -> Result<ScheduledMessage, StoreError> {
        let _guard = self.lock.lock().await;
        let mut messages = self.read_collection().await?;

        let message = ScheduledMessage {
            id: Uuid::new_v4().to_string(),
            target_user_id: target_user_id.to_string(),
            content: content.to_string(),
            send_at,
            creator_id: creator_id.map(str::to_string),
            status: MessageStatus::Pending,
            retries: 0,
            last_error: None,
            created_at: Utc::now(),
        };

        messages.push(message.clone());
        self.write_collection(&messages).await?;
        Ok(message)
    }

    /// All pending records due at or before `as_of` (default: now), in
    /// insertion order.
    pub async fn pending(
        &self,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduledMessage>, StoreError> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let _guard = self.lock.lock().await;
        let messages = self.read_collection().await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.status == MessageStatus::Pending && m.send_at <= as_of)
            .collect())
    }

    /// Transition a record to `sent`. Unknown ids are silently ignored.
    pub async fn mark_sent(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, |message| {
            message.status = MessageStatus::Sent;
        })
        .await
    }

    /// Transition a record to `failed`, bumping its retry count and
    /// overwriting its last error. Unknown ids are silently ignored.
    pub async fn mark_failed(&self, id: &str, error: Option<&str>) -> Result<(), StoreError> {
        self.update(id, |message| {
            message.status = MessageStatus::Failed;
            message.retries += 1;
            message.last_error = error.map(str::to_string);
        })
        .await
    }

    /// Full dump of the collection, for introspection and tests.
    pub async fn all(&self) -> Result<Vec<ScheduledMessage>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_collection().await
    }

    async fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut ScheduledMessage),
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut messages = self.read_collection().await?;
        if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
            apply(message);
            self.write_collection(&messages).await?;
        }
        Ok(())
    }

    async fn read_collection(&self) -> Result<Vec<ScheduledMessage>, StoreError> {
        if !self.path.exists() {
            // Lazily create an empty store on first access
            self.write_collection(&[]).await?;
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&content) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                // Deliberate lossy recovery: corrupt state is discarded,
                // not treated as fatal.
                warn!(
                    "Scheduled-message file {} is corrupt, continuing with an empty collection: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_collection(&self, messages: &[ScheduledMessage]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(messages)?;
        atomic_write(&self.path, &content).await?;
        Ok(())
    }
}
