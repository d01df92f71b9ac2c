use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{AudioBackend, BackendEvent},
        session::Session,
        track::Track,
    },
    error::{MusicError, MusicResult},
};

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Joined,
    Moved,
    AlreadyHere,
}

/// A track that just started and should be announced in `channel_id`.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub channel_id: ChannelId,
    pub track: Track,
}

/// Every live session, one per guild.
///
/// Each session sits behind its own async mutex. Commands and backend events
/// for a guild queue up on that mutex; other guilds are never blocked.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SharedSession>,
    backend: Arc<dyn AudioBackend>,
    default_volume: u16,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn AudioBackend>, default_volume: u16) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
            default_volume,
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ensures a voice link to `channel_id`, creating the session if needed.
    ///
    /// An existing link elsewhere is only moved when `can_override` is set.
    pub async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        can_override: bool,
    ) -> MusicResult<(ConnectOutcome, SharedSession)> {
        if let Some(shared) = self.get(guild_id) {
            let mut session = shared.lock().await;
            if session.channel_id() == channel_id {
                drop(session);
                return Ok((ConnectOutcome::AlreadyHere, shared));
            }
            if !can_override {
                return Err(MusicError::AlreadyConnectedElsewhere);
            }

            self.backend.join(guild_id, channel_id).await?;
            session.move_to(channel_id);
            info!("🔀 Sesión movida al canal {} en guild {}", channel_id, guild_id);
            drop(session);
            return Ok((ConnectOutcome::Moved, shared));
        }

        self.backend.join(guild_id, channel_id).await?;
        let shared = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(
                    guild_id,
                    channel_id,
                    self.default_volume,
                    self.backend.clone(),
                )))
            })
            .clone();

        info!("🎧 Nueva sesión en guild {} (total: {})", guild_id, self.len());
        Ok((ConnectOutcome::Joined, shared))
    }

    /// User-requested teardown.
    pub async fn disconnect(&self, guild_id: GuildId) -> MusicResult<()> {
        let (_, shared) = self.sessions.remove(&guild_id).ok_or(MusicError::NotConnected)?;
        let mut session = shared.lock().await;
        session.disconnect().await
    }

    /// The voice link went away without us asking (kicked, channel deleted).
    pub async fn on_link_lost(&self, guild_id: GuildId) {
        let Some((_, shared)) = self.sessions.remove(&guild_id) else {
            return;
        };
        info!("🔌 Conexión de voz perdida en guild {}, cerrando sesión", guild_id);

        let mut session = shared.lock().await;
        if let Err(e) = session.disconnect().await {
            debug!("Limpieza tras desconexión en guild {}: {}", guild_id, e);
        }
    }

    /// Applies one backend notification under the guild's session lock.
    pub async fn apply(&self, event: BackendEvent) -> Option<Announcement> {
        let guild_id = event.guild_id();
        let Some(shared) = self.get(guild_id) else {
            debug!("Evento para guild {} sin sesión, ignorado", guild_id);
            return None;
        };
        let mut session = shared.lock().await;

        match event {
            BackendEvent::TrackStart { track, .. } => Some(Announcement {
                channel_id: session.channel_id(),
                track,
            }),
            BackendEvent::TrackEnd { ticket, reason, .. } => {
                if let Err(e) = session.on_track_end(ticket, reason).await {
                    if e.is_transport() {
                        error!("❌ Error al avanzar la cola en guild {}: {:?}", guild_id, e);
                    } else {
                        warn!("No se pudo avanzar la cola en guild {}: {}", guild_id, e);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        backend::{BackendError, EndReason, MockAudioBackend},
        session::PlaybackState,
        track::Playable,
    };

    const GUILD: GuildId = GuildId::new(10);
    const HERE: ChannelId = ChannelId::new(20);
    const THERE: ChannelId = ChannelId::new(30);

    fn permissive_backend() -> MockAudioBackend {
        let mut mock = MockAudioBackend::new();
        mock.expect_join().returning(|_, _| Ok(()));
        mock.expect_leave().returning(|_| Ok(()));
        mock.expect_play().returning(|_, _, _| Ok(()));
        mock.expect_stop().returning(|_| Ok(()));
        mock
    }

    fn registry(backend: MockAudioBackend) -> SessionRegistry {
        SessionRegistry::new(Arc::new(backend), 100)
    }

    #[tokio::test]
    async fn test_connect_join_and_reuse() {
        let registry = registry(permissive_backend());

        let (first, _) = registry.connect(GUILD, HERE, false).await.unwrap();
        let (second, _) = registry.connect(GUILD, HERE, false).await.unwrap();

        assert_eq!(first, ConnectOutcome::Joined);
        assert_eq!(second, ConnectOutcome::AlreadyHere);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_elsewhere_requires_override() {
        let registry = registry(permissive_backend());
        registry.connect(GUILD, HERE, false).await.unwrap();

        assert!(matches!(
            registry.connect(GUILD, THERE, false).await,
            Err(MusicError::AlreadyConnectedElsewhere)
        ));

        let (outcome, shared) = registry.connect(GUILD, THERE, true).await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Moved);
        assert_eq!(shared.lock().await.channel_id(), THERE);
    }

    #[tokio::test]
    async fn test_failed_join_creates_no_session() {
        let mut backend = MockAudioBackend::new();
        backend
            .expect_join()
            .returning(|_, _| Err(BackendError::Voice("missing permissions".into())));
        let registry = registry(backend);

        assert!(registry.connect(GUILD, HERE, false).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_removes_session() {
        let registry = registry(permissive_backend());
        assert!(matches!(registry.disconnect(GUILD).await, Err(MusicError::NotConnected)));

        registry.connect(GUILD, HERE, false).await.unwrap();
        registry.disconnect(GUILD).await.unwrap();
        assert!(registry.get(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_events_are_applied_to_the_right_session() {
        let registry = registry(permissive_backend());
        let (_, shared) = registry.connect(GUILD, HERE, false).await.unwrap();
        {
            let mut session = shared.lock().await;
            session.enqueue(Playable::Single(Track::new("a", "A", "x")), "<@1>").await.unwrap();
            session.enqueue(Playable::Single(Track::new("b", "B", "x")), "<@1>").await.unwrap();
        }

        let start = registry
            .apply(BackendEvent::TrackStart { guild_id: GUILD, track: Track::new("a", "A", "x") })
            .await
            .unwrap();
        assert_eq!(start.channel_id, HERE);
        assert_eq!(start.track.title(), "A");

        registry
            .apply(BackendEvent::TrackEnd { guild_id: GUILD, ticket: 1, reason: EndReason::Finished })
            .await;
        let session = shared.lock().await;
        assert_eq!(session.current().unwrap().title(), "B");
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_events_for_unknown_guilds_are_dropped() {
        let registry = registry(permissive_backend());
        let ignored = registry
            .apply(BackendEvent::TrackStart {
                guild_id: GUILD,
                track: Track::new("a", "A", "x"),
            })
            .await;
        assert!(ignored.is_none());
    }

    #[tokio::test]
    async fn test_link_lost_tears_down_quietly() {
        let registry = registry(permissive_backend());
        registry.connect(GUILD, HERE, false).await.unwrap();

        registry.on_link_lost(GUILD).await;
        registry.on_link_lost(GUILD).await;

        assert!(registry.is_empty());
    }
}
