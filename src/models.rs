use std::sync::Arc;

use crate::schedule::{DirectMessenger, ScheduledMessageStore};
use crate::voice::VoiceManager;

/// Bot state shared across all command handlers
pub struct Data {
    /// Deferred direct-message store
    pub store: Arc<ScheduledMessageStore>,
    /// Voice session registry
    pub voice: Arc<VoiceManager>,
    /// Direct-message capability, also used by the delivery worker
    pub messenger: Arc<dyn DirectMessenger>,
}

impl Data {
    pub fn new(
        store: Arc<ScheduledMessageStore>,
        voice: Arc<VoiceManager>,
        messenger: Arc<dyn DirectMessenger>,
    ) -> Self {
        Self {
            store,
            voice,
            messenger,
        }
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
