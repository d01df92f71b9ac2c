use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

use crate::audio::track::{Playable, Track};

/// Failures of the voice/audio collaborator. Never shown verbatim to users.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("voice connection failed: {0}")]
    Voice(String),

    #[error("no voice connection for this guild")]
    NotConnected,

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("search failed: {0}")]
    Search(String),
}

/// Why a track handed to the backend stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Played to the end of its stream.
    Finished,
    /// Stopped on request (skip, stop, leave).
    Stopped,
    /// The stream could not be opened or broke while playing.
    LoadFailed,
}

/// Asynchronous notifications from the backend, delivered on an mpsc channel.
///
/// `ticket` echoes the value given to [`AudioBackend::play`] so the session
/// can tell a late notification from one about the track it is playing now.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    TrackStart { guild_id: GuildId, track: Track },
    TrackEnd { guild_id: GuildId, ticket: u64, reason: EndReason },
}

impl BackendEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            BackendEvent::TrackStart { guild_id, .. } | BackendEvent::TrackEnd { guild_id, .. } => {
                *guild_id
            }
        }
    }
}

/// Voice connection, resolution and playback for every guild.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), BackendError>;

    /// Resolves a URL or free-text query. `Ok(None)` means nothing matched.
    async fn search(&self, query: &str) -> Result<Option<Playable>, BackendError>;

    async fn play(&self, guild_id: GuildId, track: &Track, ticket: u64) -> Result<(), BackendError>;

    async fn pause(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn resume(&self, guild_id: GuildId) -> Result<(), BackendError>;

    /// Stops the current track. The backend still reports a `TrackEnd`.
    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), BackendError>;

    /// `volume` is a percentage in `0..=1000`.
    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), BackendError>;
}
