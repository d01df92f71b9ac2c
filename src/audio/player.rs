use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    events::EventData,
    tracks::{PlayMode, Track as SongbirdTrack, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::audio::{
    backend::{AudioBackend, BackendError, BackendEvent, EndReason},
    track::{Playable, Track},
    ytdlp,
};

/// [`AudioBackend`] on top of Songbird voice connections, streaming through yt-dlp.
///
/// Track lifecycle notifications are forwarded to the `events` channel rather
/// than acted on here; the session registry owns what happens next.
pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    current_tracks: DashMap<GuildId, TrackHandle>,
    volumes: DashMap<GuildId, u16>,
    default_volume: u16,
    events: UnboundedSender<BackendEvent>,
}

impl SongbirdBackend {
    pub fn new(
        manager: Arc<Songbird>,
        default_volume: u16,
        events: UnboundedSender<BackendEvent>,
    ) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            current_tracks: DashMap::new(),
            volumes: DashMap::new(),
            default_volume,
            events,
        }
    }

    fn current(&self, guild_id: GuildId) -> Result<TrackHandle, BackendError> {
        self.current_tracks
            .get(&guild_id)
            .map(|handle| handle.clone())
            .ok_or_else(|| BackendError::Playback("no track loaded".to_string()))
    }

    fn volume_of(&self, guild_id: GuildId) -> u16 {
        self.volumes.get(&guild_id).map(|v| *v).unwrap_or(self.default_volume)
    }
}

/// Songbird usa 1.0 como volumen original
fn to_gain(volume: u16) -> f32 {
    f32::from(volume) / 100.0
}

struct Notifiers {
    start: TrackStartNotifier,
    end: TrackEndNotifier,
    errored: TrackEndNotifier,
}

/// Builds the songbird track with its volume and lifecycle events attached,
/// so nothing can fail once it is playing.
fn prepare_track(input: Input, volume: u16, notifiers: Notifiers) -> SongbirdTrack {
    let mut prepared = SongbirdTrack::from(input).volume(to_gain(volume));
    let events = &mut prepared.events;
    events.add_event(
        EventData::new(Event::Track(TrackEvent::Playable), notifiers.start),
        Duration::ZERO,
    );
    events.add_event(
        EventData::new(Event::Track(TrackEvent::End), notifiers.end),
        Duration::ZERO,
    );
    events.add_event(
        EventData::new(Event::Track(TrackEvent::Error), notifiers.errored),
        Duration::ZERO,
    );
    prepared
}

#[async_trait]
impl AudioBackend for SongbirdBackend {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), BackendError> {
        if let Some((_, handle)) = self.current_tracks.remove(&guild_id) {
            let _ = handle.stop();
        }
        self.volumes.remove(&guild_id);

        if self.manager.get(guild_id).is_none() {
            return Err(BackendError::NotConnected);
        }
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Option<Playable>, BackendError> {
        ytdlp::resolve(query).await
    }

    async fn play(&self, guild_id: GuildId, track: &Track, ticket: u64) -> Result<(), BackendError> {
        let call = self.manager.get(guild_id).ok_or(BackendError::NotConnected)?;

        let input: Input = YoutubeDl::new(self.http.clone(), track.uri().to_string()).into();
        let fired = Arc::new(AtomicBool::new(false));
        let notifiers = Notifiers {
            start: TrackStartNotifier {
                guild_id,
                track: track.clone(),
                events: self.events.clone(),
            },
            end: TrackEndNotifier {
                guild_id,
                ticket,
                fired: fired.clone(),
                events: self.events.clone(),
            },
            errored: TrackEndNotifier {
                guild_id,
                ticket,
                fired,
                events: self.events.clone(),
            },
        };

        // Volumen y eventos van en el track antes de entregarlo al driver
        let prepared = prepare_track(input, self.volume_of(guild_id), notifiers);
        let handle = call.lock().await.play(prepared);

        if let Some(previous) = self.current_tracks.insert(guild_id, handle) {
            // Un track anterior que siga vivo ya no tiene dueño
            let _ = previous.stop();
        }

        debug!("🎵 Track entregado a songbird (ticket {}): {}", ticket, track.title());
        Ok(())
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.current(guild_id)?
            .pause()
            .map_err(|e| BackendError::Playback(e.to_string()))?;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.current(guild_id)?
            .play()
            .map_err(|e| BackendError::Playback(e.to_string()))?;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        if let Some((_, handle)) = self.current_tracks.remove(&guild_id) {
            let _ = handle.stop();
            info!("⏹️ Reproducción detenida");
        }
        Ok(())
    }

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), BackendError> {
        self.current(guild_id)?
            .seek_async(Duration::from_millis(position_ms))
            .await
            .map_err(|e| BackendError::Playback(e.to_string()))?;
        debug!("⏩ Seek a {} ms en guild {}", position_ms, guild_id);
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), BackendError> {
        self.volumes.insert(guild_id, volume);
        if let Some(handle) = self.current_tracks.get(&guild_id) {
            handle
                .set_volume(to_gain(volume))
                .map_err(|e| BackendError::Playback(e.to_string()))?;
        }
        info!("🔊 Volumen ajustado a {}%", volume);
        Ok(())
    }
}

/// Handler para cuando un track queda listo para sonar
struct TrackStartNotifier {
    guild_id: GuildId,
    track: Track,
    events: UnboundedSender<BackendEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackStartNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let event = BackendEvent::TrackStart {
            guild_id: self.guild_id,
            track: self.track.clone(),
        };
        if self.events.send(event).is_err() {
            warn!("Canal de eventos cerrado, TrackStart descartado");
        }
        None
    }
}

/// Handler para fin o error de un track. Registrado para ambos eventos,
/// envía un único `TrackEnd`.
struct TrackEndNotifier {
    guild_id: GuildId,
    ticket: u64,
    fired: Arc<AtomicBool>,
    events: UnboundedSender<BackendEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };
        if self.fired.swap(true, Ordering::SeqCst) {
            return Some(Event::Cancel);
        }

        let reason = match tracks.first().map(|(state, _)| &state.playing) {
            Some(PlayMode::Errored(e)) => {
                error!("❌ Error en track para guild {}: {:?}", self.guild_id, e);
                EndReason::LoadFailed
            }
            Some(PlayMode::Stop) => EndReason::Stopped,
            _ => EndReason::Finished,
        };

        let event = BackendEvent::TrackEnd {
            guild_id: self.guild_id,
            ticket: self.ticket,
            reason,
        };
        if self.events.send(event).is_err() {
            warn!("Canal de eventos cerrado, TrackEnd descartado");
        }
        Some(Event::Cancel)
    }
}
