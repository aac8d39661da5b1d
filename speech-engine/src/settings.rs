//! Speech settings passed through to the engine.
//!
//! The reader core never interprets these beyond the approximate speaking
//! speed used for progress estimation; each engine maps them onto its own
//! native ranges.

use serde::{Deserialize, Serialize};

const DEFAULT_RATE: f32 = 0.5;
const DEFAULT_PITCH: f32 = 1.0;
const DEFAULT_VOLUME: f32 = 1.0;

/// Words per minute at the slowest and fastest rate settings.
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 280.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// Speaking rate (0.0-1.0, default 0.5)
    #[serde(default = "default_rate")]
    pub rate: f32,

    /// Pitch multiplier (0.5-2.0, default 1.0)
    #[serde(default = "default_pitch")]
    pub pitch: f32,

    /// Volume (0.0-1.0, default 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Engine-specific voice identifier. None means the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

fn default_rate() -> f32 {
    DEFAULT_RATE
}

fn default_pitch() -> f32 {
    DEFAULT_PITCH
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            voice: None,
        }
    }
}

impl SpeechSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the speaking rate.
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the pitch multiplier.
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(0.5, 2.0);
        self
    }

    /// Set the volume.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Set the voice identifier.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Re-apply the clamps, e.g. after deserializing hand-edited values.
    pub fn clamped(self) -> Self {
        let voice = self.voice.clone();
        let mut settings = Self::default()
            .with_rate(self.rate)
            .with_pitch(self.pitch)
            .with_volume(self.volume);
        settings.voice = voice;
        settings
    }

    /// Approximate speaking speed for the current rate.
    ///
    /// Linear between 80 and 280 words per minute, so the default rate of 0.5
    /// lands on 180. Real engines drift from this; it only feeds progress
    /// estimation.
    pub fn words_per_minute(&self) -> f32 {
        MIN_WPM + self.rate.clamp(0.0, 1.0) * (MAX_WPM - MIN_WPM)
    }
}
