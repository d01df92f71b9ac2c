use std::time::Duration;
use url::Url;

/// Where a track was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    YouTube,
    YouTubeMusic,
    SoundCloud,
    Spotify,
    AppleMusic,
    Other,
}

impl SourceKind {
    /// Detecta la fuente a partir del host de la URL
    pub fn from_uri(uri: &str) -> Self {
        let Ok(url) = Url::parse(uri) else {
            return SourceKind::Other;
        };

        match url.host_str().map(|h| h.trim_start_matches("www.")) {
            Some("music.youtube.com") => SourceKind::YouTubeMusic,
            Some("youtube.com" | "m.youtube.com" | "youtu.be") => SourceKind::YouTube,
            Some("soundcloud.com" | "m.soundcloud.com") => SourceKind::SoundCloud,
            Some("open.spotify.com") => SourceKind::Spotify,
            Some("music.apple.com") => SourceKind::AppleMusic,
            _ => SourceKind::Other,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SourceKind::YouTube => "📺",
            SourceKind::YouTubeMusic => "🎶",
            SourceKind::SoundCloud => "☁️",
            SourceKind::Spotify => "🟢",
            SourceKind::AppleMusic => "🍎",
            SourceKind::Other => "🎵",
        }
    }
}

/// A playable item resolved by the audio backend.
///
/// Everything except the requester is fixed at construction. The requester is
/// attached with [`Track::requested_by`], which consumes the track, so it can
/// only happen before the track is handed to a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    uri: String,
    title: String,
    author: String,
    duration_ms: Option<u64>,
    source: SourceKind,
    seekable: bool,
    artwork: Option<String>,
    requester: Option<String>,
}

impl Track {
    pub fn new(uri: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            source: SourceKind::from_uri(&uri),
            uri,
            title: title.into(),
            author: author.into(),
            duration_ms: None,
            seekable: false,
            artwork: None,
            requester: None,
        }
    }

    // Getters
    pub fn uri(&self) -> &str {
        &self.uri
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    /// `None` means the track is unbounded (live stream).
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
    pub fn source(&self) -> SourceKind {
        self.source
    }
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }
    pub fn artwork(&self) -> Option<&str> {
        self.artwork.as_deref()
    }
    pub fn requester(&self) -> Option<&str> {
        self.requester.as_deref()
    }

    // Builders
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_seekable(mut self, seekable: bool) -> Self {
        self.seekable = seekable;
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    pub fn requested_by(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Título con el icono de su fuente, tal como aparece en la cola
    pub fn display_title(&self) -> String {
        format!("{} {}", self.source.icon(), self.title)
    }
}

/// An ordered group of tracks resolved together (playlist, album, mix).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCollection {
    pub name: Option<String>,
    pub tracks: Vec<Track>,
}

/// What a search resolves to, decided once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Playable {
    Single(Track),
    Collection(TrackCollection),
}

impl Playable {
    pub fn len(&self) -> usize {
        match self {
            Playable::Single(_) => 1,
            Playable::Collection(collection) => collection.tracks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags every track with the requester and flattens into queue order.
    pub fn into_tagged_tracks(self, requester: &str) -> Vec<Track> {
        match self {
            Playable::Single(track) => vec![track.requested_by(requester)],
            Playable::Collection(collection) => collection
                .tracks
                .into_iter()
                .map(|track| track.requested_by(requester))
                .collect(),
        }
    }

    /// Notification sent back to the channel once the item is queued.
    pub fn added_notification(&self) -> String {
        match self {
            Playable::Single(track) => format!("Added `{}` to the queue.", track.title()),
            Playable::Collection(TrackCollection { name: Some(name), tracks }) => {
                format!("Added {} tracks from the `{}` playlist to the queue.", tracks.len(), name)
            }
            Playable::Collection(TrackCollection { name: None, tracks }) if tracks.len() == 1 => {
                format!("Added `{}` to the queue.", tracks[0].title())
            }
            Playable::Collection(TrackCollection { name: None, tracks }) => {
                format!("Added `{}` tracks to the queue.", tracks.len())
            }
        }
    }
}
