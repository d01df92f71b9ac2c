use async_process::Command;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::audio::{
    backend::BackendError,
    track::{Playable, Track, TrackCollection},
};

/// Límite de entradas que se leen de una playlist
const MAX_PLAYLIST_ITEMS: usize = 500;

/// Información extraída de yt-dlp (`--dump-single-json --flat-playlist`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
    is_live: Option<bool>,
    #[serde(default)]
    entries: Vec<YtDlpInfo>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpInfo {
    fn is_playlist(&self) -> bool {
        self.kind.as_deref() == Some("playlist")
    }

    fn into_track(mut self) -> Option<Track> {
        let uri = self
            .webpage_url
            .or(self.url)
            .or_else(|| self.id.map(|id| format!("https://www.youtube.com/watch?v={id}")))?;
        let title = self.title.unwrap_or_else(|| uri.clone());
        let author = self.uploader.or(self.channel).unwrap_or_else(|| "Unknown".to_string());
        let is_live = self.is_live.unwrap_or(false);

        let mut track = Track::new(uri, title, author);
        if let Some(secs) = self.duration.filter(|_| !is_live) {
            track = track.with_duration_ms((secs * 1000.0) as u64).with_seekable(true);
        }
        // La última miniatura es la de mayor resolución
        if let Some(art) = self.thumbnail.or_else(|| self.thumbnails.pop().map(|t| t.url)) {
            track = track.with_artwork(art);
        }
        Some(track)
    }
}

/// Free-text queries become a single-result YouTube search.
pub fn search_target(query: &str) -> String {
    let query = query.trim();
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{query}"),
    }
}

/// Turns yt-dlp's JSON dump into what the session enqueues.
///
/// Search results come back as a one-entry playlist; they are unwrapped into a
/// single track so the user sees "Added `title`" rather than a collection.
pub fn parse_output(stdout: &str, is_search: bool) -> Result<Option<Playable>, BackendError> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(None);
    }

    let info: YtDlpInfo = serde_json::from_str(stdout)
        .map_err(|e| BackendError::Search(format!("invalid yt-dlp output: {e}")))?;

    if !info.is_playlist() {
        return Ok(info.into_track().map(Playable::Single));
    }

    let name = info.title.clone();
    let tracks: Vec<Track> = info
        .entries
        .into_iter()
        .take(MAX_PLAYLIST_ITEMS)
        .filter_map(YtDlpInfo::into_track)
        .collect();

    Ok(match (is_search, tracks.len()) {
        (_, 0) => None,
        (true, _) => tracks.into_iter().next().map(Playable::Single),
        (false, _) => Some(Playable::Collection(TrackCollection { name, tracks })),
    })
}

/// Resuelve una URL o búsqueda usando yt-dlp
pub async fn resolve(query: &str) -> Result<Option<Playable>, BackendError> {
    let target = search_target(query);
    let is_search = target.starts_with("ytsearch");

    info!("🔍 Resolviendo con yt-dlp: {}", target);

    let output = Command::new("yt-dlp")
        .args([
            "--dump-single-json",
            "--flat-playlist",
            "--skip-download",
            "--no-warnings",
            "--playlist-end",
            &MAX_PLAYLIST_ITEMS.to_string(),
            &target,
        ])
        .output()
        .await
        .map_err(|e| BackendError::Search(format!("failed to run yt-dlp: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp terminó con error: {}", stderr.trim());
        // yt-dlp sale con error cuando no hay resultados
        return Ok(None);
    }

    parse_output(&String::from_utf8_lossy(&output.stdout), is_search)
}

/// Verifica que yt-dlp esté instalado, devolviendo su versión
pub async fn version() -> Result<String, BackendError> {
    let output = Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await
        .map_err(|e| BackendError::Search(format!("yt-dlp is not available: {e}")))?;

    if !output.status.success() {
        return Err(BackendError::Search("yt-dlp --version failed".to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_target() {
        assert_eq!(search_target("never gonna give you up"), "ytsearch1:never gonna give you up");
        assert_eq!(
            search_target("  https://youtu.be/dQw4w9WgXcQ "),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(search_target("ftp://host/file"), "ytsearch1:ftp://host/file");
    }

    #[test]
    fn test_parse_single_video() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "uploader": "Rick Astley",
            "duration": 212.0,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        }"#;

        let Some(Playable::Single(track)) = parse_output(json, false).unwrap() else {
            panic!("expected a single track");
        };
        assert_eq!(track.title(), "Never Gonna Give You Up");
        assert_eq!(track.author(), "Rick Astley");
        assert_eq!(track.duration_ms(), Some(212_000));
        assert!(track.is_seekable());
        assert_eq!(track.artwork(), Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg"));
    }

    #[test]
    fn test_live_stream_is_unbounded() {
        let json = r#"{"title": "Lofi radio", "is_live": true, "duration": 10.0,
                       "webpage_url": "https://www.youtube.com/watch?v=live"}"#;

        let Some(Playable::Single(track)) = parse_output(json, false).unwrap() else {
            panic!("expected a single track");
        };
        assert_eq!(track.duration_ms(), None);
        assert!(!track.is_seekable());
    }

    #[test]
    fn test_parse_playlist() {
        let json = r#"{
            "_type": "playlist",
            "title": "Road Trip",
            "entries": [
                {"id": "a1", "title": "First", "channel": "Band", "duration": 100,
                 "url": "https://www.youtube.com/watch?v=a1",
                 "thumbnails": [{"url": "small"}, {"url": "large"}]},
                {"id": "b2", "title": "Second", "duration": 50}
            ]
        }"#;

        let Some(Playable::Collection(collection)) = parse_output(json, false).unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(collection.name.as_deref(), Some("Road Trip"));
        assert_eq!(collection.tracks.len(), 2);
        assert_eq!(collection.tracks[0].author(), "Band");
        assert_eq!(collection.tracks[0].artwork(), Some("large"));
        assert_eq!(collection.tracks[1].uri(), "https://www.youtube.com/watch?v=b2");
    }

    #[test]
    fn test_search_result_is_unwrapped() {
        let json = r#"{"_type": "playlist", "title": "search",
                       "entries": [{"id": "x", "title": "Hit"}]}"#;
        assert!(matches!(parse_output(json, true).unwrap(), Some(Playable::Single(_))));

        let empty = r#"{"_type": "playlist", "title": "search", "entries": []}"#;
        assert!(parse_output(empty, true).unwrap().is_none());
        assert!(parse_output("", true).unwrap().is_none());
    }

    #[test]
    fn test_garbage_output_is_an_error() {
        assert!(matches!(parse_output("not json", false), Err(BackendError::Search(_))));
    }
}
