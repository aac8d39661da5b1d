//! Mock speech engine for testing
//!
//! Records every control call so tests can assert on what a caller asked the
//! engine to do, and can either finish utterances on its own or leave event
//! delivery to the test.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::{EngineEvent, EventKind, EventSender, SpeechEngine, UtteranceId, Voice};
use crate::error::{Result, SpeechError};
use crate::settings::SpeechSettings;

#[derive(Debug, Default)]
struct MockLog {
    spoken: Vec<(UtteranceId, String)>,
    pauses: usize,
    resumes: usize,
    stops: usize,
}

/// How the mock reacts to `speak`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Accept and stay silent; the test injects events itself
    Manual,
    /// Emit Started and Finished right away
    AutoFinish,
}

/// A mock engine for testing playback sequencing
pub struct MockEngine {
    log: Arc<Mutex<MockLog>>,
    settings: SpeechSettings,
    events: Option<EventSender>,
    mode: Mode,
    /// Number of speak calls to reject before accepting
    fail_count: usize,
    /// Message used for rejected speak calls
    fail_message: String,
    reports_progress: bool,
    supports_pause: bool,
}

impl MockEngine {
    /// Create an engine that accepts everything and emits nothing
    pub fn manual() -> Self {
        Self {
            log: Arc::new(Mutex::new(MockLog::default())),
            settings: SpeechSettings::default(),
            events: None,
            mode: Mode::Manual,
            fail_count: 0,
            fail_message: String::new(),
            reports_progress: false,
            supports_pause: true,
        }
    }

    /// Create an engine that reports every utterance finished as soon as it starts
    pub fn auto_finishing(events: EventSender) -> Self {
        Self {
            events: Some(events),
            mode: Mode::AutoFinish,
            ..Self::manual()
        }
    }

    /// Create an engine that rejects the first `n` speak calls, then accepts
    pub fn fails_then_succeeds(n: usize, message: &str) -> Self {
        Self {
            fail_count: n,
            fail_message: message.to_string(),
            ..Self::manual()
        }
    }

    /// Create an engine that rejects every speak call
    pub fn always_fails(message: &str) -> Self {
        Self::fails_then_succeeds(usize::MAX, message)
    }

    /// Claim word-level progress support (and emit it in auto-finish mode)
    pub fn with_progress_reports(mut self) -> Self {
        self.reports_progress = true;
        self
    }

    /// Reject pause and resume, like a synthesizer that can only be stopped
    pub fn without_pause(mut self) -> Self {
        self.supports_pause = false;
        self
    }

    /// Handle for inspecting calls after the engine has been moved into its owner
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            log: Arc::clone(&self.log),
        }
    }

    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, utterance: UtteranceId, kind: EventKind) {
        if let Some(events) = &self.events {
            // Receiver gone means the owner shut down; nothing left to notify
            let _ = events.send(EngineEvent::new(utterance, kind));
        }
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn speak(&mut self, utterance: UtteranceId, text: &str) -> Result<()> {
        let attempt = {
            let mut log = self.log();
            log.spoken.push((utterance, text.to_string()));
            log.spoken.len()
        };

        if attempt <= self.fail_count {
            return Err(SpeechError::SpeakFailed(self.fail_message.clone()));
        }

        if self.mode == Mode::AutoFinish {
            self.emit(utterance, EventKind::Started);
            if self.reports_progress {
                let total_words = text.split_whitespace().count();
                self.emit(
                    utterance,
                    EventKind::Progress {
                        fraction: 1.0,
                        current_word: total_words,
                        total_words,
                    },
                );
            }
            self.emit(utterance, EventKind::Finished);
        }

        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.log().pauses += 1;
        if !self.supports_pause {
            return Err(SpeechError::Unsupported {
                engine: "mock",
                operation: "pause",
            });
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.log().resumes += 1;
        if !self.supports_pause {
            return Err(SpeechError::Unsupported {
                engine: "mock",
                operation: "resume",
            });
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.log().stops += 1;
    }

    fn reports_progress(&self) -> bool {
        self.reports_progress
    }

    fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    fn set_settings(&mut self, settings: SpeechSettings) {
        self.settings = settings;
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        Ok(vec![
            Voice {
                id: "mock-en".to_string(),
                name: "Mock English".to_string(),
                language: "en".to_string(),
                is_default: true,
            },
            Voice {
                id: "mock-de".to_string(),
                name: "Mock German".to_string(),
                language: "de".to_string(),
                is_default: false,
            },
        ])
    }
}

/// Shared view of a [`MockEngine`]'s call log
#[derive(Clone)]
pub struct MockHandle {
    log: Arc<Mutex<MockLog>>,
}

impl MockHandle {
    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every speak call in order, including rejected ones
    pub fn spoken(&self) -> Vec<(UtteranceId, String)> {
        self.log().spoken.clone()
    }

    /// Texts passed to speak, in order
    pub fn spoken_texts(&self) -> Vec<String> {
        self.log().spoken.iter().map(|(_, text)| text.clone()).collect()
    }

    /// Utterance id of the most recent speak call
    pub fn last_utterance(&self) -> Option<UtteranceId> {
        self.log().spoken.last().map(|(id, _)| *id)
    }

    pub fn speak_count(&self) -> usize {
        self.log().spoken.len()
    }

    pub fn pause_count(&self) -> usize {
        self.log().pauses
    }

    pub fn resume_count(&self) -> usize {
        self.log().resumes
    }

    pub fn stop_count(&self) -> usize {
        self.log().stops
    }
}
