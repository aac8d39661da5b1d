//! Playback sequencing: feeding chunks to a speech engine one at a time.

mod clock;
mod sequencer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sequencer::Sequencer;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default time without a sign of life before playback is declared stalled
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunk fraction below which a silent engine counts as stalled
pub const STALL_PROGRESS_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Speaking,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Speaking => write!(f, "speaking"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Point-in-time view of playback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    /// Index of the chunk being spoken
    pub current_chunk: usize,
    pub total_chunks: usize,
    /// Overall progress in `[0, 1]`
    pub progress: f64,
    /// Approximate word position across all chunks
    pub current_word: usize,
    pub total_words: usize,
    /// Time spent paused during this playback
    pub paused_duration: Duration,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Cannot start at chunk {index} of {total}")]
    InvalidStart { index: usize, total: usize },

    #[error("Speech engine failed: {0}")]
    EngineStartFailure(String),

    #[error("Speech engine stalled on chunk {chunk} (no response for {}s)", .waited.as_secs())]
    Stalled { chunk: usize, waited: Duration },
}

/// Notifications emitted by the sequencer, drained with
/// [`Sequencer::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    ChunkStarted { index: usize },
    Paused,
    Resumed,
    Progress(PlaybackSnapshot),
    Finished,
    Stopped,
    Error(PlaybackError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub stall_timeout: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}

impl SequencerConfig {
    pub fn with_stall_timeout_secs(mut self, secs: u64) -> Self {
        self.stall_timeout = Duration::from_secs(secs.max(1));
        self
    }
}
