use dashmap::DashMap;
use poise::serenity_prelude::GuildId;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{JOIN_READY_TIMEOUT, SUPPORTED_AUDIO_EXTENSIONS};
use crate::utils::audio::is_supported_audio;

use super::transport::{
    AudioPlayer, ChannelKind, PlayerEvent, TransportError, VoiceCapabilities, VoiceChannelTarget,
    VoiceConnection, VoiceTransport,
};

/// Errors surfaced to the command layer by voice operations
#[derive(Debug)]
pub enum VoiceError {
    NotAVoiceChannel,
    NotInGuild,
    MissingPermissions { can_connect: bool, can_speak: bool },
    HandshakeTimeout,
    EncryptionUnavailable,
    ConnectionFailed(String),
    NoActiveConnection,
    UnsupportedFormat(String),
    PlaybackFailed(String),
}

impl std::fmt::Display for VoiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceError::NotAVoiceChannel => {
                write!(f, "That channel is not a voice or stage channel")
            }
            VoiceError::NotInGuild => {
                write!(f, "Voice channels can only be joined inside a server")
            }
            VoiceError::MissingPermissions {
                can_connect,
                can_speak,
            } => {
                let mut missing = Vec::new();
                if !can_connect {
                    missing.push("Connect");
                }
                if !can_speak {
                    missing.push("Speak");
                }
                write!(
                    f,
                    "I'm missing the {} permission on that channel",
                    missing.join(" and ")
                )
            }
            VoiceError::HandshakeTimeout => write!(
                f,
                "The voice connection did not become ready within {} seconds",
                JOIN_READY_TIMEOUT.as_secs()
            ),
            VoiceError::EncryptionUnavailable => write!(
                f,
                "Voice encryption support is missing. Install the optional encryption \
                 backend (rebuild with the transport's crypto feature enabled) and restart"
            ),
            VoiceError::ConnectionFailed(reason) => {
                write!(f, "Could not establish the voice connection: {}", reason)
            }
            VoiceError::NoActiveConnection => {
                write!(f, "No active voice connection for this server")
            }
            VoiceError::UnsupportedFormat(name) => write!(
                f,
                "Unsupported audio format '{}', expected one of: {}",
                name,
                SUPPORTED_AUDIO_EXTENSIONS.join(", ")
            ),
            VoiceError::PlaybackFailed(reason) => write!(f, "Playback failed: {}", reason),
        }
    }
}

impl std::error::Error for VoiceError {}

struct VoiceSession {
    connection: Arc<dyn VoiceConnection>,
    player: Option<Arc<dyn AudioPlayer>>,
}

/// Registry of at most one voice session per guild, mediating join,
/// playback, and teardown against the transport.
pub struct VoiceManager {
    transport: Arc<dyn VoiceTransport>,
    sessions: DashMap<GuildId, VoiceSession>,
    // Serializes join/play per guild so two concurrent joins cannot both
    // pass the existence check before either registers
    guild_locks: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl VoiceManager {
    pub fn new(transport: Arc<dyn VoiceTransport>) -> Self {
        Self {
            transport,
            sessions: DashMap::new(),
            guild_locks: DashMap::new(),
        }
    }

    /// Join a voice channel, reusing a live connection if one exists.
    ///
    /// The readiness handshake is bounded; on timeout or failure the
    /// half-open connection is torn down best-effort and no session is
    /// registered.
    pub async fn join(
        &self,
        target: &VoiceChannelTarget,
        capabilities: VoiceCapabilities,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        let guild_id = target.guild_id.ok_or(VoiceError::NotInGuild)?;
        if !matches!(target.kind, ChannelKind::Voice | ChannelKind::Stage) {
            return Err(VoiceError::NotAVoiceChannel);
        }
        if !capabilities.can_connect || !capabilities.can_speak {
            return Err(VoiceError::MissingPermissions {
                can_connect: capabilities.can_connect,
                can_speak: capabilities.can_speak,
            });
        }

        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        if let Some(session) = self.sessions.get(&guild_id) {
            let connection = session.connection.clone();
            drop(session);
            if !connection.is_destroyed().await {
                debug!("Reusing live voice connection for guild {}", guild_id);
                return Ok(connection);
            }
            // Leftover entry for a dead connection, replace it
            self.sessions.remove(&guild_id);
        }

        let connection = match timeout(
            JOIN_READY_TIMEOUT,
            self.transport.connect(guild_id, target.channel_id),
        )
        .await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                self.teardown_half_open(guild_id).await;
                return Err(setup_error(e));
            }
            Err(_elapsed) => {
                self.teardown_half_open(guild_id).await;
                return Err(VoiceError::HandshakeTimeout);
            }
        };

        let (player, events) = match connection.create_player().await {
            Ok(pair) => pair,
            Err(e) => {
                if let Err(destroy_err) = connection.destroy().await {
                    warn!(
                        "Failed to destroy connection after player setup failed in guild {}: {}",
                        guild_id, destroy_err
                    );
                }
                return Err(setup_error(e));
            }
        };
        watch_player(guild_id, events);

        self.sessions.insert(
            guild_id,
            VoiceSession {
                connection: connection.clone(),
                player: Some(player),
            },
        );
        info!(
            "Joined voice channel {} in guild {}",
            target.channel_id, guild_id
        );
        Ok(connection)
    }

    /// Stream a local audio file into the guild's session, reusing its
    /// player.
    pub async fn play(
        &self,
        guild_id: GuildId,
        file_path: impl AsRef<Path>,
    ) -> Result<(), VoiceError> {
        let path = file_path.as_ref();

        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let Some((connection, existing_player)) = self
            .sessions
            .get(&guild_id)
            .map(|s| (s.connection.clone(), s.player.clone()))
        else {
            return Err(VoiceError::NoActiveConnection);
        };
        if connection.is_destroyed().await {
            return Err(VoiceError::NoActiveConnection);
        }

        if !is_supported_audio(path) {
            return Err(VoiceError::UnsupportedFormat(path.display().to_string()));
        }

        let player = match existing_player {
            Some(player) => player,
            None => {
                let (player, events) = connection.create_player().await.map_err(setup_error)?;
                watch_player(guild_id, events);
                if let Some(mut session) = self.sessions.get_mut(&guild_id) {
                    session.player = Some(player.clone());
                }
                player
            }
        };

        player.play_file(path).await.map_err(|e| match e {
            TransportError::EncryptionUnavailable => VoiceError::EncryptionUnavailable,
            TransportError::Failed(reason) => VoiceError::PlaybackFailed(reason),
        })?;

        info!("Playing {} in guild {}", path.display(), guild_id);
        Ok(())
    }

    /// Tear down the guild's session. Stop/destroy failures are logged
    /// and never prevent the registry entry from being removed. Returns
    /// whether a session existed.
    pub async fn leave(&self, guild_id: GuildId) -> bool {
        let Some((connection, player)) = self
            .sessions
            .get(&guild_id)
            .map(|s| (s.connection.clone(), s.player.clone()))
        else {
            return false;
        };

        if let Some(player) = player
            && let Err(e) = player.stop().await
        {
            warn!("Failed to stop player in guild {}: {}", guild_id, e);
        }
        if let Err(e) = connection.destroy().await {
            warn!(
                "Failed to destroy voice connection in guild {}: {}",
                guild_id, e
            );
        }

        // Removal happens regardless of teardown failures
        self.sessions.remove(&guild_id);
        info!("Left voice channel in guild {}", guild_id);
        true
    }

    /// Whether the guild has a session with a live connection
    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        let Some(connection) = self.sessions.get(&guild_id).map(|s| s.connection.clone()) else {
            return false;
        };
        !connection.is_destroyed().await
    }

    /// Best-effort teardown of every session, then clear the registry.
    /// Run at process shutdown.
    pub async fn destroy_all(&self) {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.connection.clone(), entry.player.clone()))
            .collect();

        for (guild_id, connection, player) in sessions {
            if let Some(player) = player
                && let Err(e) = player.stop().await
            {
                warn!("Failed to stop player in guild {}: {}", guild_id, e);
            }
            if let Err(e) = connection.destroy().await {
                warn!(
                    "Failed to destroy voice connection in guild {}: {}",
                    guild_id, e
                );
            }
        }

        self.sessions.clear();
        info!("All voice sessions destroyed");
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.guild_locks.entry(guild_id).or_default().clone()
    }

    async fn teardown_half_open(&self, guild_id: GuildId) {
        if let Err(e) = self.transport.disconnect(guild_id).await {
            warn!(
                "Failed to tear down half-open voice connection in guild {}: {}",
                guild_id, e
            );
        }
    }
}

fn setup_error(e: TransportError) -> VoiceError {
    match e {
        TransportError::EncryptionUnavailable => VoiceError::EncryptionUnavailable,
        TransportError::Failed(reason) => VoiceError::ConnectionFailed(reason),
    }
}

/// Log player errors and acknowledge idle transitions without crashing
fn watch_player(guild_id: GuildId, mut events: mpsc::UnboundedReceiver<PlayerEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::Errored(reason) => {
                    warn!("Playback error in guild {}: {}", guild_id, reason);
                }
                PlayerEvent::Idle => {
                    debug!("Playback finished in guild {}", guild_id);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use poise::serenity_prelude::ChannelId;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum ConnectBehavior {
        Ready,
        SlowReady,
        Stall,
        RefuseHandshake,
        MissingEncryption,
    }

    struct MockTransport {
        behavior: ConnectBehavior,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        connections: StdMutex<Vec<Arc<MockConnection>>>,
    }

    impl MockTransport {
        fn with(behavior: ConnectBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                connections: StdMutex::new(Vec::new()),
            })
        }

        fn ready() -> Arc<Self> {
            Self::with(ConnectBehavior::Ready)
        }

        fn last_connection(&self) -> Arc<MockConnection> {
            self.connections.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl VoiceTransport for MockTransport {
        async fn connect(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
            match self.behavior {
                ConnectBehavior::Stall => return std::future::pending().await,
                ConnectBehavior::SlowReady => {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
                ConnectBehavior::RefuseHandshake => {
                    return Err(TransportError::Failed("handshake refused".to_string()));
                }
                ConnectBehavior::MissingEncryption => {
                    return Err(TransportError::EncryptionUnavailable);
                }
                ConnectBehavior::Ready => {}
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            let connection = Arc::new(MockConnection::default());
            self.connections.lock().unwrap().push(connection.clone());
            Ok(connection)
        }

        async fn disconnect(&self, _guild_id: GuildId) -> Result<(), TransportError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockConnection {
        destroyed: AtomicBool,
        fail_destroy: AtomicBool,
        players: StdMutex<Vec<Arc<MockPlayer>>>,
    }

    impl MockConnection {
        fn player_count(&self) -> usize {
            self.players.lock().unwrap().len()
        }

        fn last_player(&self) -> Arc<MockPlayer> {
            self.players.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl VoiceConnection for MockConnection {
        async fn create_player(
            &self,
        ) -> Result<(Arc<dyn AudioPlayer>, mpsc::UnboundedReceiver<PlayerEvent>), TransportError>
        {
            let (events, rx) = mpsc::unbounded_channel();
            let player = Arc::new(MockPlayer {
                played: StdMutex::new(Vec::new()),
                fail_stop: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                _events: events,
            });
            self.players.lock().unwrap().push(player.clone());
            Ok((player, rx))
        }

        async fn is_destroyed(&self) -> bool {
            self.destroyed.load(Ordering::SeqCst)
        }

        async fn destroy(&self) -> Result<(), TransportError> {
            if self.fail_destroy.load(Ordering::SeqCst) {
                return Err(TransportError::Failed("destroy exploded".to_string()));
            }
            self.destroyed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockPlayer {
        played: StdMutex<Vec<PathBuf>>,
        fail_stop: AtomicBool,
        stopped: AtomicBool,
        _events: mpsc::UnboundedSender<PlayerEvent>,
    }

    impl MockPlayer {
        fn played(&self) -> Vec<PathBuf> {
            self.played.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioPlayer for MockPlayer {
        async fn play_file(&self, path: &Path) -> Result<(), TransportError> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn stop(&self) -> Result<(), TransportError> {
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(TransportError::Failed("stop exploded".to_string()));
            }
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn voice_target(guild: u64, channel: u64) -> VoiceChannelTarget {
        VoiceChannelTarget {
            channel_id: ChannelId::new(channel),
            guild_id: Some(GuildId::new(guild)),
            kind: ChannelKind::Voice,
        }
    }

    fn full_caps() -> VoiceCapabilities {
        VoiceCapabilities {
            can_connect: true,
            can_speak: true,
        }
    }

    #[tokio::test]
    async fn join_reuses_a_live_connection() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        let target = voice_target(1, 10);

        let first = manager.join(&target, full_caps()).await.unwrap();
        let second = manager.join(&target, full_caps()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn join_rejects_non_voice_channels() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        let target = VoiceChannelTarget {
            kind: ChannelKind::Other,
            ..voice_target(1, 10)
        };

        let result = manager.join(&target, full_caps()).await;

        assert!(matches!(result, Err(VoiceError::NotAVoiceChannel)));
        assert_eq!(manager.session_count(), 0);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn join_requires_a_guild() {
        let manager = VoiceManager::new(MockTransport::ready());
        let target = VoiceChannelTarget {
            guild_id: None,
            ..voice_target(1, 10)
        };

        let result = manager.join(&target, full_caps()).await;

        assert!(matches!(result, Err(VoiceError::NotInGuild)));
    }

    #[tokio::test]
    async fn join_rejects_missing_speak_permission() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        let capabilities = VoiceCapabilities {
            can_connect: true,
            can_speak: false,
        };

        let result = manager.join(&voice_target(1, 10), capabilities).await;

        assert!(matches!(
            result,
            Err(VoiceError::MissingPermissions {
                can_speak: false,
                ..
            })
        ));
        assert!(!manager.is_active(GuildId::new(1)).await);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn join_times_out_and_unwinds_the_half_open_connection() {
        let transport = MockTransport::with(ConnectBehavior::Stall);
        let manager = VoiceManager::new(transport.clone());

        let result = manager.join(&voice_target(1, 10), full_caps()).await;

        assert!(matches!(result, Err(VoiceError::HandshakeTimeout)));
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn join_reports_a_remediation_for_missing_encryption() {
        let transport = MockTransport::with(ConnectBehavior::MissingEncryption);
        let manager = VoiceManager::new(transport.clone());

        let error = manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap_err();

        assert!(matches!(error, VoiceError::EncryptionUnavailable));
        assert!(error.to_string().contains("Install"));
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn join_surfaces_handshake_failures_descriptively() {
        let transport = MockTransport::with(ConnectBehavior::RefuseHandshake);
        let manager = VoiceManager::new(transport.clone());

        let error = manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap_err();

        match error {
            VoiceError::ConnectionFailed(reason) => assert!(reason.contains("handshake refused")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_joins_share_one_connection() {
        let transport = MockTransport::with(ConnectBehavior::SlowReady);
        let manager = VoiceManager::new(transport.clone());
        let target = voice_target(1, 10);

        let (first, second) = tokio::join!(
            manager.join(&target, full_caps()),
            manager.join(&target, full_caps())
        );

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn play_without_a_session_fails() {
        let manager = VoiceManager::new(MockTransport::ready());

        let result = manager.play(GuildId::new(1), "clip.ogg").await;

        assert!(matches!(result, Err(VoiceError::NoActiveConnection)));
    }

    #[tokio::test]
    async fn play_rejects_unsupported_extensions_without_touching_the_player() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap();

        let result = manager.play(GuildId::new(1), "clip.mp3").await;

        match result {
            Err(VoiceError::UnsupportedFormat(name)) => assert!(name.contains("clip.mp3")),
            other => panic!("unexpected result: {:?}", other),
        }
        let connection = transport.last_connection();
        assert_eq!(connection.player_count(), 1); // the one created by join
        assert!(connection.last_player().played().is_empty());
    }

    #[tokio::test]
    async fn play_reuses_the_same_player_across_calls() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap();

        manager.play(GuildId::new(1), "a.ogg").await.unwrap();
        manager.play(GuildId::new(1), "b.opus").await.unwrap();

        let connection = transport.last_connection();
        assert_eq!(connection.player_count(), 1);
        assert_eq!(
            connection.last_player().played(),
            [PathBuf::from("a.ogg"), PathBuf::from("b.opus")]
        );
    }

    #[tokio::test]
    async fn leave_stops_the_player_and_destroys_the_connection() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap();

        assert!(manager.leave(GuildId::new(1)).await);

        let connection = transport.last_connection();
        assert!(connection.destroyed.load(Ordering::SeqCst));
        assert!(connection.last_player().stopped.load(Ordering::SeqCst));
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn leave_always_clears_the_registry() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap();

        let connection = transport.last_connection();
        connection.fail_destroy.store(true, Ordering::SeqCst);
        connection
            .last_player()
            .fail_stop
            .store(true, Ordering::SeqCst);

        assert!(manager.leave(GuildId::new(1)).await);
        assert!(!manager.is_active(GuildId::new(1)).await);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn leave_without_a_session_returns_false() {
        let manager = VoiceManager::new(MockTransport::ready());

        assert!(!manager.leave(GuildId::new(1)).await);
    }

    #[tokio::test]
    async fn destroy_all_clears_every_session_despite_failures() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        manager
            .join(&voice_target(1, 10), full_caps())
            .await
            .unwrap();
        let first_connection = transport.last_connection();
        first_connection.fail_destroy.store(true, Ordering::SeqCst);
        manager
            .join(&voice_target(2, 20), full_caps())
            .await
            .unwrap();
        let second_connection = transport.last_connection();

        manager.destroy_all().await;

        assert_eq!(manager.session_count(), 0);
        assert!(second_connection.destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_destroyed_connection_is_not_active_and_gets_replaced() {
        let transport = MockTransport::ready();
        let manager = VoiceManager::new(transport.clone());
        let target = voice_target(1, 10);

        let first = manager.join(&target, full_caps()).await.unwrap();
        transport.last_connection().destroy().await.unwrap();
        assert!(!manager.is_active(GuildId::new(1)).await);

        let second = manager.join(&target, full_caps()).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        assert!(manager.is_active(GuildId::new(1)).await);
    }
}
