use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId};
use songbird::error::JoinError;
use songbird::input::File as FileInput;
use songbird::tracks::PlayMode;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use super::transport::{AudioPlayer, PlayerEvent, TransportError, VoiceConnection, VoiceTransport};

/// Production transport driving Discord voice through songbird.
///
/// songbird's `join` resolves once the gateway and driver handshakes
/// complete, so a resolved connect here is a ready connection.
pub struct DiscordVoiceGateway {
    songbird: Arc<Songbird>,
}

impl DiscordVoiceGateway {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self { songbird }
    }
}

#[async_trait]
impl VoiceTransport for DiscordVoiceGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        Ok(Arc::new(GatewayConnection {
            guild_id,
            call,
            songbird: self.songbird.clone(),
        }))
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), TransportError> {
        match self.songbird.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(TransportError::Failed(e.to_string())),
        }
    }
}

struct GatewayConnection {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    songbird: Arc<Songbird>,
}

#[async_trait]
impl VoiceConnection for GatewayConnection {
    async fn create_player(
        &self,
    ) -> Result<(Arc<dyn AudioPlayer>, mpsc::UnboundedReceiver<PlayerEvent>), TransportError> {
        let (events, rx) = mpsc::unbounded_channel();
        {
            let mut call = self.call.lock().await;
            call.add_global_event(
                Event::Track(TrackEvent::Error),
                TrackWatcher {
                    events: events.clone(),
                },
            );
            call.add_global_event(Event::Track(TrackEvent::End), TrackWatcher { events });
        }

        Ok((
            Arc::new(GatewayPlayer {
                call: self.call.clone(),
            }),
            rx,
        ))
    }

    async fn is_destroyed(&self) -> bool {
        self.call.lock().await.current_connection().is_none()
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        match self.songbird.remove(self.guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(TransportError::Failed(e.to_string())),
        }
    }
}

struct GatewayPlayer {
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl AudioPlayer for GatewayPlayer {
    async fn play_file(&self, path: &Path) -> Result<(), TransportError> {
        let source = FileInput::new(path.to_path_buf());
        let mut call = self.call.lock().await;
        // Replaces whatever is currently playing on this call
        let _ = call.play_only_input(source.into());
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.call.lock().await.stop();
        Ok(())
    }
}

/// Forwards songbird track notifications into the player event stream
struct TrackWatcher {
    events: mpsc::UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackWatcher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                match &state.playing {
                    PlayMode::Errored(e) => {
                        let _ = self.events.send(PlayerEvent::Errored(format!("{:?}", e)));
                    }
                    PlayMode::End | PlayMode::Stop => {
                        let _ = self.events.send(PlayerEvent::Idle);
                    }
                    _ => {}
                }
            }
        }
        None
    }
}
