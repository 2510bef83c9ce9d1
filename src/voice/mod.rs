/// Voice session management
mod gateway;
mod manager;
mod transport;

// Re-export public types and functions
pub use gateway::DiscordVoiceGateway;
pub use manager::{VoiceError, VoiceManager};
pub use transport::{
    AudioPlayer, ChannelKind, PlayerEvent, TransportError, VoiceCapabilities, VoiceChannelTarget,
    VoiceConnection, VoiceTransport,
};
