//! The playback state machine.
//!
//! The sequencer never blocks and never spawns. Its owner calls it with user
//! commands, engine events and periodic ticks; it drives the engine and queues
//! [`PlaybackEvent`]s for the owner to drain.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use speech_engine::{EngineEvent, EventKind, SpeechEngine, UtteranceId};

use super::{
    Clock, PlaybackError, PlaybackEvent, PlaybackSnapshot, PlaybackState,
    STALL_PROGRESS_THRESHOLD, SequencerConfig, SystemClock,
};
use crate::text::{Chunk, total_words};

/// Ceiling on a chunk's fraction until the engine reports it finished
const MAX_UNFINISHED_FRACTION: f64 = 0.99;

/// Timing of the utterance currently held by the engine
#[derive(Debug, Clone, Copy)]
struct ChunkTiming {
    started_at: Instant,
    /// Paused time within this chunk, excluding an ongoing pause
    paused: Duration,
    /// Dispatch, Started ack, progress advance or resume
    last_activity: Instant,
    acknowledged: bool,
    engine_fraction: Option<f64>,
}

impl ChunkTiming {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            paused: Duration::ZERO,
            last_activity: now,
            acknowledged: false,
            engine_fraction: None,
        }
    }
}

/// What `resume` has to do to get speech going again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeAction {
    /// The engine holds the paused utterance
    Engine,
    /// The engine could not pause and was stopped; speak the chunk again
    Restart,
    /// The chunk finished while paused; move on to the next one
    Advance,
}

pub struct Sequencer<E, C = SystemClock> {
    engine: E,
    clock: C,
    config: SequencerConfig,
    state: PlaybackState,
    chunks: Vec<Chunk>,
    index: usize,
    total_words: usize,
    utterance: Option<UtteranceId>,
    last_utterance: UtteranceId,
    timing: Option<ChunkTiming>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    resume_action: ResumeAction,
    /// Overall progress; only ever raised within a playback
    progress: f64,
    events: Vec<PlaybackEvent>,
}

impl<E: SpeechEngine> Sequencer<E, SystemClock> {
    pub fn new(engine: E, config: SequencerConfig) -> Self {
        Self::with_clock(engine, SystemClock, config)
    }
}

impl<E: SpeechEngine, C: Clock> Sequencer<E, C> {
    pub fn with_clock(engine: E, clock: C, config: SequencerConfig) -> Self {
        Self {
            engine,
            clock,
            config,
            state: PlaybackState::Stopped,
            chunks: Vec::new(),
            index: 0,
            total_words: 0,
            utterance: None,
            last_utterance: UtteranceId(0),
            timing: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            resume_action: ResumeAction::Engine,
            progress: 0.0,
            events: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Index of the chunk in play, None when stopped.
    pub fn current_index(&self) -> Option<usize> {
        (self.state != PlaybackState::Stopped).then_some(self.index)
    }

    /// Begin speaking `chunks` at `start_index`.
    ///
    /// Any active playback is stopped first. An empty list or an index past
    /// the end is rejected without touching the current playback.
    pub fn start(&mut self, chunks: Vec<Chunk>, start_index: usize) -> Result<(), PlaybackError> {
        if start_index >= chunks.len() {
            return Err(PlaybackError::InvalidStart {
                index: start_index,
                total: chunks.len(),
            });
        }

        if self.state != PlaybackState::Stopped {
            debug!("Replacing active playback");
            self.engine.stop();
        }
        self.reset();

        self.total_words = total_words(&chunks);
        self.progress = start_index as f64 / chunks.len() as f64;
        self.chunks = chunks;
        self.index = start_index;

        info!(
            "Starting playback at chunk {} of {} ({} words)",
            start_index + 1,
            self.chunks.len(),
            self.total_words
        );
        self.dispatch()
    }

    /// Feed an event from the engine.
    ///
    /// Events for any utterance other than the one in play are dropped.
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        if self.utterance != Some(event.utterance) {
            debug!("Ignoring {:?} for stale {}", event.kind, event.utterance);
            return;
        }

        let now = self.clock.now();
        match event.kind {
            EventKind::Started => {
                let speaking = self.state == PlaybackState::Speaking;
                if let Some(timing) = &mut self.timing {
                    if !timing.acknowledged && speaking {
                        timing.started_at = now;
                        timing.paused = Duration::ZERO;
                    }
                    timing.acknowledged = true;
                    timing.last_activity = now;
                }
            }
            EventKind::Progress { fraction, .. } => {
                let fraction = f64::from(fraction).clamp(0.0, 1.0);
                if let Some(timing) = &mut self.timing {
                    timing.acknowledged = true;
                    if timing.engine_fraction.is_none_or(|previous| fraction > previous) {
                        timing.engine_fraction = Some(fraction);
                        timing.last_activity = now;
                    }
                }
                self.refresh_progress(now);
                if self.state == PlaybackState::Speaking {
                    let snapshot = self.snapshot();
                    self.events.push(PlaybackEvent::Progress(snapshot));
                }
            }
            EventKind::Finished => {
                if self.state == PlaybackState::Paused {
                    debug!("Chunk {} finished while paused", self.index);
                    self.utterance = None;
                    self.resume_action = ResumeAction::Advance;
                } else {
                    self.advance();
                }
            }
            EventKind::Cancelled => {
                info!("{} cancelled by the engine", event.utterance);
                self.reset();
                self.events.push(PlaybackEvent::Stopped);
            }
            EventKind::Failed(message) => {
                warn!("{} failed: {}", event.utterance, message);
                self.fail(PlaybackError::EngineStartFailure(message));
            }
        }
    }

    /// Pause speech. No effect unless speaking.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Speaking {
            return;
        }

        let now = self.clock.now();
        self.refresh_progress(now);

        match self.engine.pause() {
            Ok(()) => self.resume_action = ResumeAction::Engine,
            Err(e) => {
                warn!("{} cannot pause ({}); stopping instead", self.engine.name(), e);
                self.engine.stop();
                self.utterance = None;
                self.resume_action = ResumeAction::Restart;
            }
        }

        self.state = PlaybackState::Paused;
        self.paused_at = Some(now);
        self.events.push(PlaybackEvent::Paused);
    }

    /// Resume speech. No effect unless paused.
    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }

        let now = self.clock.now();
        if let Some(paused_at) = self.paused_at.take() {
            let paused = now.saturating_duration_since(paused_at);
            self.paused_total += paused;
            if let Some(timing) = &mut self.timing {
                timing.paused += paused;
                timing.last_activity = now;
            }
        }

        self.state = PlaybackState::Speaking;
        self.events.push(PlaybackEvent::Resumed);

        match self.resume_action {
            ResumeAction::Engine => {
                if let Err(e) = self.engine.resume() {
                    warn!("{} cannot resume ({}); restarting chunk", self.engine.name(), e);
                    self.engine.stop();
                    let _ = self.dispatch();
                }
            }
            ResumeAction::Restart => {
                let _ = self.dispatch();
            }
            ResumeAction::Advance => self.advance(),
        }
    }

    /// Stop playback and reset. Always stops the engine; safe to repeat.
    pub fn stop(&mut self) {
        self.engine.stop();
        if self.state == PlaybackState::Stopped {
            return;
        }

        info!("Playback stopped");
        self.reset();
        self.events.push(PlaybackEvent::Stopped);
    }

    /// Refresh progress and check for a stalled engine. No effect unless
    /// speaking.
    pub fn tick(&mut self) {
        if self.state != PlaybackState::Speaking {
            return;
        }

        let now = self.clock.now();
        self.refresh_progress(now);

        if let Some(waited) = self.stalled_for(now) {
            let chunk = self.index;
            warn!(
                "No response from {} for {:?} on chunk {}; stopping",
                self.engine.name(),
                waited,
                chunk
            );
            self.engine.stop();
            self.fail(PlaybackError::Stalled { chunk, waited });
            return;
        }

        let snapshot = self.snapshot();
        self.events.push(PlaybackEvent::Progress(snapshot));
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let now = self.clock.now();
        let progress = self.progress.max(self.overall_progress(now));
        let ongoing_pause = self
            .paused_at
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));

        PlaybackSnapshot {
            state: self.state,
            current_chunk: self.index,
            total_chunks: self.chunks.len(),
            progress,
            current_word: (progress * self.total_words as f64).floor() as usize,
            total_words: self.total_words,
            paused_duration: self.paused_total + ongoing_pause,
        }
    }

    /// Drain queued notifications, oldest first.
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    fn dispatch(&mut self) -> Result<(), PlaybackError> {
        let now = self.clock.now();
        let utterance = self.last_utterance.next();
        self.last_utterance = utterance;

        let text = &self.chunks[self.index].text;
        match self.engine.speak(utterance, text) {
            Ok(()) => {
                debug!("Dispatched chunk {} as {}", self.index, utterance);
                self.state = PlaybackState::Speaking;
                self.utterance = Some(utterance);
                self.timing = Some(ChunkTiming::new(now));
                self.resume_action = ResumeAction::Engine;
                self.events.push(PlaybackEvent::ChunkStarted { index: self.index });
                Ok(())
            }
            Err(e) => {
                warn!("{} rejected chunk {}: {}", self.engine.name(), self.index, e);
                let error = PlaybackError::EngineStartFailure(e.to_string());
                self.fail(error.clone());
                Err(error)
            }
        }
    }

    /// Move to the next chunk, or finish after the last one.
    fn advance(&mut self) {
        if self.index + 1 < self.chunks.len() {
            self.index += 1;
            self.progress = self
                .progress
                .max(self.index as f64 / self.chunks.len() as f64);
            let _ = self.dispatch();
        } else {
            info!("Playback finished");
            self.reset();
            self.events.push(PlaybackEvent::Finished);
        }
    }

    fn fail(&mut self, error: PlaybackError) {
        self.reset();
        self.events.push(PlaybackEvent::Error(error));
        self.events.push(PlaybackEvent::Stopped);
    }

    fn reset(&mut self) {
        self.state = PlaybackState::Stopped;
        self.chunks.clear();
        self.index = 0;
        self.total_words = 0;
        self.utterance = None;
        self.timing = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.resume_action = ResumeAction::Engine;
        self.progress = 0.0;
    }

    /// Fraction of the current chunk spoken, below 1 until it finishes.
    fn chunk_fraction(&self, now: Instant) -> f64 {
        let Some(timing) = &self.timing else {
            return 0.0;
        };

        let fraction = match timing.engine_fraction {
            Some(fraction) => fraction,
            None if !timing.acknowledged => 0.0,
            None => match self.expected_duration() {
                Some(expected) => {
                    self.active_elapsed(timing, now).as_secs_f64() / expected.as_secs_f64()
                }
                None => 0.0,
            },
        };

        fraction.clamp(0.0, MAX_UNFINISHED_FRACTION)
    }

    /// Estimated speaking time of the current chunk at the engine's rate.
    fn expected_duration(&self) -> Option<Duration> {
        let words = self.chunks.get(self.index).map_or(0, |c| c.word_count);
        let words_per_second = f64::from(self.engine.settings().words_per_minute()) / 60.0;
        if words == 0 || words_per_second <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(words as f64 / words_per_second))
    }

    /// Time since the chunk started, minus time spent paused.
    fn active_elapsed(&self, timing: &ChunkTiming, now: Instant) -> Duration {
        let ongoing_pause = self
            .paused_at
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));
        now.saturating_duration_since(timing.started_at)
            .saturating_sub(timing.paused)
            .saturating_sub(ongoing_pause)
    }

    fn overall_progress(&self, now: Instant) -> f64 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        let overall = (self.index as f64 + self.chunk_fraction(now)) / self.chunks.len() as f64;
        overall.clamp(0.0, 1.0)
    }

    fn refresh_progress(&mut self, now: Instant) {
        self.progress = self.progress.max(self.overall_progress(now));
    }

    /// How long the engine has gone without finishing or advancing, if that
    /// counts as a stall.
    ///
    /// Until the utterance is acknowledged, and for engines that report
    /// progress, silence past the timeout with little progress is a stall.
    /// Acknowledged engines without progress reports get the estimated chunk
    /// duration plus the timeout before Finished must arrive.
    fn stalled_for(&self, now: Instant) -> Option<Duration> {
        let timing = self.timing.as_ref()?;

        if !timing.acknowledged || self.engine.reports_progress() {
            let silent_for = now.saturating_duration_since(timing.last_activity);
            return (silent_for >= self.config.stall_timeout
                && self.chunk_fraction(now) < STALL_PROGRESS_THRESHOLD)
                .then_some(silent_for);
        }

        let deadline = self.expected_duration().unwrap_or(Duration::ZERO) + self.config.stall_timeout;
        let active = self.active_elapsed(timing, now);
        (active >= deadline).then_some(active)
    }
}
