//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`track`] - Tracks
//! - What a search resolves to, tagged with who asked for it
//!
//! ### [`queue`] - Queue Management
//! - Index-addressable backlog with loop modes, reordering and shuffle
//!
//! ### [`session`] - Playback State Machine
//! - `Idle` / `Playing` / `Paused`, advancing on backend end notifications
//! - Play tickets so late notifications never advance the wrong track
//!
//! ### [`registry`] - Sessions per Guild
//! - One session per voice connection, each behind its own async mutex
//! - Applies backend events under the same lock as user commands
//!
//! ### [`backend`] / [`player`] - Audio Backend
//! - The [`backend::AudioBackend`] seam the session talks to
//! - [`player::SongbirdBackend`], the Songbird + yt-dlp implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use musebot::audio::{session::Session, track::{Playable, Track}};
//! # use std::sync::Arc;
//! # use serenity::all::{ChannelId, GuildId};
//! # async fn example(backend: Arc<dyn musebot::audio::backend::AudioBackend>) -> anyhow::Result<()> {
//! let mut session = Session::new(GuildId::new(1), ChannelId::new(2), 100, backend);
//!
//! let track = Track::new("https://youtu.be/dQw4w9WgXcQ", "Never Gonna Give You Up", "Rick Astley");
//! session.enqueue(Playable::Single(track), "<@42>").await?;
//! session.pause_toggle().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;
pub mod ytdlp;
