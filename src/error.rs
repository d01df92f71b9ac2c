//! Domain errors.
//!
//! Every [`MusicError`] variant is recoverable and its `Display` output is the
//! message shown to the user. The dispatch layer in [`crate::bot::handlers`]
//! turns them into chat responses; only [`MusicError::Backend`] is logged with
//! detail and replaced by a generic message.

use thiserror::Error;

use crate::audio::backend::BackendError;

#[derive(Debug, Error)]
pub enum MusicError {
    // Queue misuse
    #[error("Please enter a valid queue position.")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Those positions are the same, so nothing would change.")]
    SameIndex(usize),

    #[error("A track can't be moved onto its own position.")]
    InvalidIndex { from: usize, to: usize },

    // Session preconditions
    #[error("This track doesn't allow seeking, sorry.")]
    NotSeekable,

    #[error("{0}")]
    OutOfRange(String),

    #[error("No track currently playing.")]
    NoActiveTrack,

    #[error("Voice player is currently being used in another channel.")]
    AlreadyConnectedElsewhere,

    #[error("No player to perform this on.")]
    NotConnected,

    #[error("You are not connected to a voice channel.")]
    NotInVoiceChannel,

    #[error("You are not connected to the same voice channel as the bot.")]
    NotInBotVoiceChannel,

    #[error("Failed to convert {0}. Make sure you're using the `<hours>:<minutes>:<seconds>` format.")]
    InvalidTimeFormat(String),

    #[error("Could not find any audio matching `{0}`.")]
    SearchFailed(String),

    #[error("Something went wrong while talking to the audio node.")]
    Backend(#[from] BackendError),
}

impl MusicError {
    /// Transport failures are not the user's fault and deserve a log line.
    pub fn is_transport(&self) -> bool {
        matches!(self, MusicError::Backend(_))
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
