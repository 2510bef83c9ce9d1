use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Failure to deliver a direct message
#[derive(Debug)]
pub enum DeliveryError {
    /// The recipient id could not be resolved to a reachable user
    UnknownRecipient(String),
    /// The platform rejected the message send
    SendRejected(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::UnknownRecipient(reason) => {
                write!(f, "could not resolve recipient: {}", reason)
            }
            DeliveryError::SendRejected(reason) => write!(f, "send rejected: {}", reason),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Capability to resolve a user by id and deliver a direct text message
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct_message(&self, user_id: &str, content: &str)
    -> Result<(), DeliveryError>;
}

/// `DirectMessenger` backed by Discord's REST API
pub struct DiscordMessenger {
    http: Arc<serenity::Http>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DirectMessenger for DiscordMessenger {
    async fn send_direct_message(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let id: u64 = user_id
            .parse()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| {
                DeliveryError::UnknownRecipient(format!("invalid user id '{}'", user_id))
            })?;

        let channel = serenity::UserId::new(id)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| DeliveryError::UnknownRecipient(e.to_string()))?;

        channel
            .id
            .say(&self.http, content)
            .await
            .map_err(|e| DeliveryError::SendRejected(e.to_string()))?;

        Ok(())
    }
}
