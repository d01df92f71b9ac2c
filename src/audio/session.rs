use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        backend::{AudioBackend, EndReason},
        queue::{LoopMode, MusicQueue},
        track::{Playable, Track},
    },
    error::{MusicError, MusicResult},
};

pub const MAX_VOLUME: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Result of queueing a search result.
#[derive(Debug)]
pub struct EnqueueReport {
    pub added: usize,
    /// Set when the session was idle and playback started from this call.
    pub started: Option<Track>,
}

/// Per-guild player: one queue, the track on air, and the play/advance protocol.
///
/// A session does no locking of its own. The registry keeps it behind a
/// per-guild async mutex, and both user commands and backend end
/// notifications go through that lock, so every method here sees a stable
/// state for its whole duration.
pub struct Session {
    guild_id: GuildId,
    channel_id: ChannelId,
    queue: MusicQueue,
    current: Option<Track>,
    state: PlaybackState,
    volume: u16,
    ticket: u64,
    backend: Arc<dyn AudioBackend>,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        volume: u16,
        backend: Arc<dyn AudioBackend>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            queue: MusicQueue::new(),
            current: None,
            state: PlaybackState::Idle,
            volume: volume.min(MAX_VOLUME),
            ticket: 0,
            backend,
        }
    }

    #[allow(dead_code)]
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub(crate) fn move_to(&mut self, channel_id: ChannelId) {
        self.channel_id = channel_id;
    }

    pub fn queue(&self) -> &MusicQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MusicQueue {
        &mut self.queue
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// Tags and queues everything in `item`, starting playback if idle.
    pub async fn enqueue(&mut self, item: Playable, requester: &str) -> MusicResult<EnqueueReport> {
        let added = self.queue.enqueue_many(item.into_tagged_tracks(requester));

        let started = if self.state == PlaybackState::Idle {
            self.start_next().await?
        } else {
            None
        };

        Ok(EnqueueReport { added, started })
    }

    /// Reacts to the backend reporting that the track with `ticket` stopped.
    ///
    /// Returns the track now on air, if any. Notifications for a ticket other
    /// than the latest one are stale and ignored.
    pub async fn on_track_end(&mut self, ticket: u64, reason: EndReason) -> MusicResult<Option<Track>> {
        if ticket != self.ticket || self.state == PlaybackState::Idle {
            debug!(
                "Ignorando fin de track obsoleto en guild {} (ticket {}, actual {})",
                self.guild_id, ticket, self.ticket
            );
            return Ok(None);
        }

        let finished = self.current.take();
        self.state = PlaybackState::Idle;

        let result = match (self.queue.mode(), finished) {
            (LoopMode::LoopOne, Some(track)) if reason == EndReason::Finished => {
                debug!("🔂 Repitiendo: {}", track.title());
                self.queue.push_front(track);
                self.start_next().await
            }
            (LoopMode::LoopAll, Some(track)) if reason != EndReason::LoadFailed => {
                self.queue.enqueue(track);
                self.start_next().await
            }
            _ => self.start_next().await,
        };

        if self.current.is_none() {
            info!("⏹️ Cola terminada en guild {}", self.guild_id);
        }
        result
    }

    /// Pausa o reanuda. Returns the state after the toggle.
    pub async fn pause_toggle(&mut self) -> MusicResult<PlaybackState> {
        match self.state {
            PlaybackState::Idle => return Err(MusicError::NoActiveTrack),
            PlaybackState::Playing => {
                self.backend.pause(self.guild_id).await?;
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                self.backend.resume(self.guild_id).await?;
                self.state = PlaybackState::Playing;
            }
        }
        self.check_invariant();
        Ok(self.state)
    }

    /// Resumes a paused track. `Ok(false)` when nothing was paused.
    pub async fn resume(&mut self) -> MusicResult<bool> {
        match self.state {
            PlaybackState::Idle => Err(MusicError::NoActiveTrack),
            PlaybackState::Playing => Ok(false),
            PlaybackState::Paused => {
                self.backend.resume(self.guild_id).await?;
                self.state = PlaybackState::Playing;
                Ok(true)
            }
        }
    }

    /// Jumps to queue position `index`, dropping everything before it.
    ///
    /// While a track is on air it is only stopped here; the resulting end
    /// notification advances onto the new front. Skipping turns off
    /// single-track looping.
    pub async fn skip(&mut self, index: usize) -> MusicResult<()> {
        self.queue.skip_to(index)?;
        if self.queue.mode() == LoopMode::LoopOne {
            self.queue.set_mode(LoopMode::Normal);
        }

        if self.state == PlaybackState::Idle {
            self.start_next().await?;
        } else {
            self.backend.stop(self.guild_id).await?;
        }
        info!("⏭️ Saltando a la posición {} en guild {}", index, self.guild_id);
        Ok(())
    }

    pub async fn seek(&mut self, position_ms: i64) -> MusicResult<()> {
        let track = self.current.as_ref().ok_or(MusicError::NoActiveTrack)?;
        if !track.is_seekable() {
            return Err(MusicError::NotSeekable);
        }

        let position = u64::try_from(position_ms)
            .ok()
            .filter(|pos| track.duration_ms().map_or(true, |len| *pos <= len))
            .ok_or_else(|| {
                MusicError::OutOfRange("The track length doesn't support that position.".to_string())
            })?;

        self.backend.seek(self.guild_id, position).await?;
        Ok(())
    }

    pub async fn set_volume(&mut self, volume: i64) -> MusicResult<u16> {
        let volume = u16::try_from(volume)
            .ok()
            .filter(|v| *v <= MAX_VOLUME)
            .ok_or_else(|| {
                MusicError::OutOfRange(format!("Volume must be between 0 and {MAX_VOLUME}."))
            })?;

        self.backend.set_volume(self.guild_id, volume).await?;
        self.volume = volume;
        Ok(volume)
    }

    /// Tears the voice link down and empties the session.
    ///
    /// Local state is reset even if the backend fails to leave, so the
    /// registry can always drop the session afterwards.
    pub async fn disconnect(&mut self) -> MusicResult<()> {
        self.reset();
        self.backend.leave(self.guild_id).await?;
        Ok(())
    }

    /// Clears local state without touching the backend, for links that are
    /// already gone (kicked from the channel, channel deleted).
    pub(crate) fn reset(&mut self) {
        // Invalida cualquier TrackEnd en vuelo
        self.ticket += 1;
        self.queue.clear();
        self.current = None;
        self.state = PlaybackState::Idle;
    }

    /// Dequeues the front and hands it to the backend.
    ///
    /// If the backend refuses the track it goes back to the front of the
    /// queue and the session stays idle.
    async fn start_next(&mut self) -> MusicResult<Option<Track>> {
        let Some(track) = self.queue.dequeue_front() else {
            self.current = None;
            self.state = PlaybackState::Idle;
            return Ok(None);
        };

        self.ticket += 1;
        if let Err(e) = self.backend.play(self.guild_id, &track, self.ticket).await {
            warn!("No se pudo reproducir {}: {}", track.title(), e);
            self.queue.push_front(track);
            self.current = None;
            self.state = PlaybackState::Idle;
            return Err(e.into());
        }

        info!("🎵 Reproduciendo: {} en guild {}", track.title(), self.guild_id);
        self.current = Some(track.clone());
        self.state = PlaybackState::Playing;
        self.check_invariant();
        Ok(Some(track))
    }

    fn check_invariant(&mut self) {
        let holds = self.state == PlaybackState::Idle || self.current.is_some();
        debug_assert!(holds, "session {} is {:?} with no current track", self.guild_id, self.state);
        if !holds {
            warn!("Estado inconsistente en guild {}, volviendo a Idle", self.guild_id);
            self.state = PlaybackState::Idle;
        }
    }
}
