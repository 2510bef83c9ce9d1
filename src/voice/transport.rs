use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Kind of channel a join may target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Stage,
    Other,
}

/// A join target, resolved by the command layer
#[derive(Debug, Clone, Copy)]
pub struct VoiceChannelTarget {
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub kind: ChannelKind,
}

/// Capabilities the bot holds on the target channel, computed by the
/// command layer from the platform's permission model
#[derive(Debug, Clone, Copy)]
pub struct VoiceCapabilities {
    pub can_connect: bool,
    pub can_speak: bool,
}

/// Notifications emitted by an audio player
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Playback raised an error, described as text
    Errored(String),
    /// Playback finished and the player went idle
    Idle,
}

/// Transport-layer failure
#[derive(Debug)]
pub enum TransportError {
    /// The optional encryption backend is not installed
    EncryptionUnavailable,
    /// Any other failure, described as text
    Failed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::EncryptionUnavailable => {
                write!(f, "voice encryption backend unavailable")
            }
            TransportError::Failed(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// Capability to open transport-layer voice connections
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Open a connection to a voice channel and complete the readiness
    /// handshake. Resolves only once the connection can carry audio.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError>;

    /// Best-effort teardown of any half-open connection state for a guild
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), TransportError>;
}

/// An open voice connection, exclusively owned by one session
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Create a playback handle carried by this connection, together with
    /// its event stream
    async fn create_player(
        &self,
    ) -> Result<(Arc<dyn AudioPlayer>, mpsc::UnboundedReceiver<PlayerEvent>), TransportError>;

    async fn is_destroyed(&self) -> bool;

    async fn destroy(&self) -> Result<(), TransportError>;
}

/// A playback handle, reused across plays within one session
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Stream a local audio file and route the connection's output
    /// through this player
    async fn play_file(&self, path: &Path) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;
}
