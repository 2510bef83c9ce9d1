/// Scheduled-message store and delivery worker
mod messenger;
mod store;
mod types;
mod worker;

// Re-export public types and functions
pub use messenger::{DeliveryError, DirectMessenger, DiscordMessenger};
pub use store::ScheduledMessageStore;
pub use types::{MessageStatus, ScheduledMessage, StoreError};
pub use worker::DeliveryWorker;
