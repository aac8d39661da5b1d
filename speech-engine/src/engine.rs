use std::fmt;

use tokio::sync::mpsc;

use crate::error::{Result, SpeechError};
use crate::settings::SpeechSettings;

/// Identity of one `speak` call.
///
/// Assigned by the caller, echoed back on every event the engine emits for
/// that call. A caller that has moved on (stopped, skipped ahead) compares
/// ids and drops events for utterances it no longer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl UtteranceId {
    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

/// What happened to an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Audio output began
    Started,
    /// Word-level progress within the utterance
    Progress {
        fraction: f32,
        current_word: usize,
        total_words: usize,
    },
    /// The utterance played to the end
    Finished,
    /// The utterance was cut short by `stop`
    Cancelled,
    /// The engine gave up on the utterance after accepting it
    Failed(String),
}

/// An event emitted by an engine for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub utterance: UtteranceId,
    pub kind: EventKind,
}

impl EngineEvent {
    pub fn new(utterance: UtteranceId, kind: EventKind) -> Self {
        Self { utterance, kind }
    }
}

/// Channel engines publish their events on.
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// A voice offered by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    pub is_default: bool,
}

/// Trait for speech engines
///
/// Control calls are synchronous and must all be made from one context;
/// most native synthesizers are not thread-safe. Completion and progress are
/// reported asynchronously through the engine's [`EventSender`].
pub trait SpeechEngine: Send {
    /// Engine name for display
    fn name(&self) -> &'static str;

    /// Start speaking `text`, replacing anything currently playing.
    ///
    /// `Ok` means the engine accepted the text; `Err` means it could not
    /// start at all and no events will follow for `utterance`.
    fn speak(&mut self, utterance: UtteranceId, text: &str) -> Result<()>;

    /// Pause the current utterance
    fn pause(&mut self) -> Result<()>;

    /// Resume a paused utterance
    fn resume(&mut self) -> Result<()>;

    /// Stop immediately. Safe to call when idle.
    fn stop(&mut self);

    /// Whether the engine emits `Progress` events
    fn reports_progress(&self) -> bool {
        false
    }

    /// Current settings
    fn settings(&self) -> &SpeechSettings;

    /// Replace the settings; applies from the next `speak`
    fn set_settings(&mut self, settings: SpeechSettings);

    /// Voices this engine can use
    fn voices(&self) -> Result<Vec<Voice>> {
        Ok(Vec::new())
    }

    /// Select a voice by id or name
    fn set_voice(&mut self, voice_id: &str) -> Result<()> {
        let voices = self.voices()?;
        let voice = voices
            .iter()
            .find(|v| v.id == voice_id || v.name == voice_id)
            .ok_or_else(|| SpeechError::VoiceNotFound(voice_id.to_string()))?;
        let settings = self.settings().clone().with_voice(voice.id.clone());
        self.set_settings(settings);
        Ok(())
    }
}

impl<T: SpeechEngine + ?Sized> SpeechEngine for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn speak(&mut self, utterance: UtteranceId, text: &str) -> Result<()> {
        (**self).speak(utterance, text)
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn reports_progress(&self) -> bool {
        (**self).reports_progress()
    }

    fn settings(&self) -> &SpeechSettings {
        (**self).settings()
    }

    fn set_settings(&mut self, settings: SpeechSettings) {
        (**self).set_settings(settings)
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        (**self).voices()
    }

    fn set_voice(&mut self, voice_id: &str) -> Result<()> {
        (**self).set_voice(voice_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_next() {
        let id = UtteranceId(41);
        assert_eq!(id.next(), UtteranceId(42));
        assert!(id < id.next());
    }

    #[test]
    fn test_utterance_display() {
        assert_eq!(UtteranceId(7).to_string(), "utterance#7");
    }
}
