//! Reader session runtime.
//!
//! A single tokio task owns the extraction coordinator and the playback
//! sequencer. User commands, engine events, progress ticks and finished
//! extraction jobs all arrive on channels and are handled one at a time in
//! that task, so the coordinator and sequencer never need locking.

use std::time::Duration;

use log::{debug, info};
use speech_engine::{EngineEvent, SpeechEngine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ReaderConfig;
use crate::extraction::{Coordinator, ExtractionResult, PageRange, extract_range};
use crate::pdf::PdfTextSource;
use crate::playback::{PlaybackError, PlaybackEvent, PlaybackState, Sequencer};

/// How often playback progress is refreshed
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Requests accepted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select pages and extract them in the background
    SetPageRange { start: i64, end: i64 },
    /// Start reading; waits for an extraction in flight
    Play { from_chunk: Option<usize> },
    Pause,
    Resume,
    Stop,
    NextChunk,
    PreviousChunk,
    SetChunkSize(usize),
    Shutdown,
}

/// What an extraction produced, without the text itself
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    pub success: bool,
    pub error_message: Option<String>,
    pub page_range: PageRange,
    pub total_chunks: usize,
    pub total_words: usize,
    pub is_chunked: bool,
}

impl From<&ExtractionResult> for ExtractionSummary {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            success: result.success,
            error_message: result.error_message.clone(),
            page_range: result.page_range,
            total_chunks: result.total_chunks(),
            total_words: result.total_words(),
            is_chunked: result.is_chunked,
        }
    }
}

/// Notifications from a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ExtractionStarted(PageRange),
    Extracted(ExtractionSummary),
    Playback(PlaybackEvent),
}

/// Control side of a spawned session
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue a command. Returns false once the session has ended.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Stop playback, end the session and wait for it.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }

    /// Wait for the session to end on its own.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

pub struct ReaderSession<S, E> {
    coordinator: Coordinator<S>,
    sequencer: Sequencer<E>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    auto_start: bool,
    /// Generation of the extraction job still running, if any
    in_flight: Option<u64>,
    /// Chunk to start from once the running extraction lands
    pending_play: Option<usize>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<S, E> ReaderSession<S, E>
where
    S: PdfTextSource + Clone + 'static,
    E: SpeechEngine + 'static,
{
    /// Spawn a session onto the current tokio runtime.
    ///
    /// `engine_events` must be the receiving end of the channel `engine`
    /// publishes on.
    pub fn spawn(
        source: S,
        engine: E,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        config: &ReaderConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Self {
            coordinator: Coordinator::new(source, config.extraction_options()),
            sequencer: Sequencer::new(engine, config.sequencer_config()),
            engine_events,
            auto_start: config.auto_start,
            in_flight: None,
            pending_play: None,
            events: event_tx,
        };

        let task = tokio::spawn(session.run(command_rx));
        (
            SessionHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        )
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, ExtractionResult)>();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command, &done_tx),
                },
                Some(event) = self.engine_events.recv() => {
                    self.sequencer.on_engine_event(event);
                }
                Some((generation, result)) = done_rx.recv() => {
                    self.install(generation, result);
                }
                _ = ticker.tick() => {
                    self.sequencer.tick();
                }
            }

            self.forward_playback_events();
        }

        debug!("Session shutting down");
        self.sequencer.stop();
        self.forward_playback_events();
    }

    fn handle_command(
        &mut self,
        command: Command,
        done: &mpsc::UnboundedSender<(u64, ExtractionResult)>,
    ) {
        debug!("Command: {:?}", command);
        match command {
            Command::SetPageRange { start, end } => self.begin_extraction(start, end, done),
            Command::Play { from_chunk } => {
                let index = from_chunk.unwrap_or(self.coordinator.current_chunk_index());
                if self.in_flight.is_some() {
                    self.pending_play = Some(index);
                } else {
                    self.play_from(index);
                }
            }
            Command::Pause => self.sequencer.pause(),
            Command::Resume => self.sequencer.resume(),
            Command::Stop => {
                self.pending_play = None;
                self.sequencer.stop();
            }
            Command::NextChunk => {
                if self.coordinator.next_chunk() {
                    self.restart_if_playing();
                }
            }
            Command::PreviousChunk => {
                if self.coordinator.previous_chunk() {
                    self.restart_if_playing();
                }
            }
            Command::SetChunkSize(size) => {
                self.sequencer.stop();
                if !self.coordinator.set_chunk_size(size) {
                    return;
                }
                if self.in_flight.is_some() {
                    // The running job cuts chunks at the old size
                    let range = self.coordinator.page_range();
                    self.begin_extraction(i64::from(range.start), i64::from(range.end), done);
                } else if !self.coordinator.result().is_pending() {
                    self.emit(SessionEvent::Extracted(self.coordinator.result().into()));
                }
            }
            Command::Shutdown => {}
        }
    }

    fn begin_extraction(
        &mut self,
        start: i64,
        end: i64,
        done: &mpsc::UnboundedSender<(u64, ExtractionResult)>,
    ) {
        self.sequencer.stop();
        // A Play queued for the replaced range does not carry over
        self.pending_play = None;
        let (generation, range) = self.coordinator.begin_page_range(start, end);
        self.in_flight = Some(generation);
        self.emit(SessionEvent::ExtractionStarted(range));

        let source = self.coordinator.source().clone();
        let options = self.coordinator.options().clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let result = extract_range(&source, range, &options);
            // Session gone means nobody wants the result
            let _ = done.send((generation, result));
        });
    }

    fn install(&mut self, generation: u64, result: ExtractionResult) {
        if !self.coordinator.install_result(generation, result) {
            return;
        }
        self.in_flight = None;

        let summary = ExtractionSummary::from(self.coordinator.result());
        info!(
            "Extracted {}: {} words in {} chunk(s)",
            summary.page_range, summary.total_words, summary.total_chunks
        );
        let success = summary.success;
        self.emit(SessionEvent::Extracted(summary));

        let start = self.pending_play.take();
        if success && (start.is_some() || self.auto_start) {
            self.play_from(start.unwrap_or(0));
        }
    }

    fn play_from(&mut self, index: usize) {
        if !self.coordinator.set_current_chunk(index) {
            self.emit(SessionEvent::Playback(PlaybackEvent::Error(
                PlaybackError::InvalidStart {
                    index,
                    total: self.coordinator.total_chunks(),
                },
            )));
            return;
        }

        // Failures are queued as playback events as well
        let _ = self.sequencer.start(self.coordinator.chunks().to_vec(), index);
    }

    fn restart_if_playing(&mut self) {
        if self.sequencer.state() != PlaybackState::Stopped {
            self.play_from(self.coordinator.current_chunk_index());
        }
    }

    fn forward_playback_events(&mut self) {
        for event in self.sequencer.take_events() {
            if let PlaybackEvent::ChunkStarted { index } = event {
                self.coordinator.set_current_chunk(index);
            }
            self.emit(SessionEvent::Playback(event));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // A caller that dropped the receiver is not interested
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::MemorySource;
    use speech_engine::MockEngine;
    use std::sync::Arc;
    use tokio::time::timeout;

    fn pages(count: usize, words: usize) -> Arc<MemorySource> {
        Arc::new(MemorySource::new((0..count).map(|_| "word ".repeat(words))))
    }

    /// Source that takes a while per page, so commands land mid-extraction
    struct SlowSource {
        pages: MemorySource,
        delay: Duration,
    }

    impl PdfTextSource for SlowSource {
        fn page_count(&self) -> Result<u32, crate::pdf::SourceError> {
            self.pages.page_count()
        }

        fn page_text(&self, page: u32) -> Result<String, crate::pdf::SourceError> {
            std::thread::sleep(self.delay);
            self.pages.page_text(page)
        }
    }

    fn slow_pages(count: usize, words: usize) -> Arc<SlowSource> {
        Arc::new(SlowSource {
            pages: MemorySource::new((0..count).map(|_| "word ".repeat(words))),
            delay: Duration::from_millis(200),
        })
    }

    fn extracted(events: &[SessionEvent]) -> Vec<ExtractionSummary> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Extracted(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    fn config(chunk_size: usize, auto_start: bool) -> ReaderConfig {
        ReaderConfig {
            chunk_size,
            auto_start,
            ..ReaderConfig::default()
        }
    }

    /// Collect events until `done` matches one, or fail after a few seconds
    async fn collect_until(
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        done: impl Fn(&SessionEvent) -> bool,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        let result = timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                let stop = done(&event);
                seen.push(event);
                if stop {
                    break;
                }
            }
        })
        .await;
        assert!(result.is_ok(), "timed out; saw {:?}", seen);
        seen
    }

    fn chunk_starts(events: &[SessionEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Playback(PlaybackEvent::ChunkStarted { index }) => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_extracts_and_reads_all_chunks() {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::auto_finishing(engine_tx);
        let handle = engine.handle();

        let (session, mut events) =
            ReaderSession::spawn(pages(3, 1000), engine, engine_rx, &config(1000, true));
        assert!(session.send(Command::SetPageRange { start: 1, end: 3 }));

        let seen = collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::Finished))
        })
        .await;

        let summary = seen
            .iter()
            .find_map(|e| match e {
                SessionEvent::Extracted(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert!(summary.success);
        assert!(summary.is_chunked);
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.total_words, 3000);

        assert_eq!(chunk_starts(&seen), vec![0, 1, 2]);
        assert_eq!(handle.speak_count(), 3);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_play_waits_for_extraction() {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::auto_finishing(engine_tx);

        let (session, mut events) =
            ReaderSession::spawn(pages(3, 1000), engine, engine_rx, &config(1000, false));
        session.send(Command::SetPageRange { start: 1, end: 3 });
        session.send(Command::Play { from_chunk: Some(1) });

        let seen = collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::Finished))
        })
        .await;
        assert_eq!(chunk_starts(&seen), vec![1, 2]);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_extraction_does_not_play() {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::auto_finishing(engine_tx);
        let handle = engine.handle();
        let source = Arc::new(MemorySource::new(["", "  "]));

        let (session, mut events) =
            ReaderSession::spawn(source, engine, engine_rx, &config(1000, true));
        session.send(Command::SetPageRange { start: 1, end: 2 });

        let seen = collect_until(&mut events, |e| matches!(e, SessionEvent::Extracted(_))).await;
        match seen.last() {
            Some(SessionEvent::Extracted(summary)) => {
                assert!(!summary.success);
                assert!(summary.error_message.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }

        session.send(Command::Play { from_chunk: None });
        let seen = collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::Error(_)))
        })
        .await;
        assert!(matches!(
            seen.last(),
            Some(SessionEvent::Playback(PlaybackEvent::Error(
                PlaybackError::InvalidStart { index: 0, total: 0 }
            )))
        ));
        assert_eq!(handle.speak_count(), 0);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_pause_resume_and_stop() {
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::manual();
        let handle = engine.handle();

        let (session, mut events) =
            ReaderSession::spawn(pages(1, 50), engine, engine_rx, &config(1000, true));
        session.send(Command::SetPageRange { start: 1, end: 1 });
        collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::ChunkStarted { .. }))
        })
        .await;

        session.send(Command::Pause);
        collect_until(&mut events, |e| matches!(e, SessionEvent::Playback(PlaybackEvent::Paused))).await;
        session.send(Command::Resume);
        collect_until(&mut events, |e| matches!(e, SessionEvent::Playback(PlaybackEvent::Resumed))).await;
        session.send(Command::Stop);
        collect_until(&mut events, |e| matches!(e, SessionEvent::Playback(PlaybackEvent::Stopped))).await;

        assert_eq!(handle.pause_count(), 1);
        assert_eq!(handle.resume_count(), 1);
        assert!(handle.stop_count() >= 1);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_next_chunk_restarts_playback() {
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::manual();
        let handle = engine.handle();

        let (session, mut events) =
            ReaderSession::spawn(pages(3, 1000), engine, engine_rx, &config(1000, true));
        session.send(Command::SetPageRange { start: 1, end: 3 });
        collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::ChunkStarted { index: 0 }))
        })
        .await;

        session.send(Command::NextChunk);
        collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Playback(PlaybackEvent::ChunkStarted { index: 1 }))
        })
        .await;
        assert_eq!(handle.speak_count(), 2);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_chunk_size_change_during_extraction_applies() {
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::manual();

        let (session, mut events) =
            ReaderSession::spawn(slow_pages(3, 1000), engine, engine_rx, &config(1000, false));
        session.send(Command::SetPageRange { start: 1, end: 3 });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.send(Command::SetChunkSize(5000));

        let seen = collect_until(&mut events, |e| matches!(e, SessionEvent::Extracted(_))).await;
        let summaries = extracted(&seen);
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].success);
        assert_eq!(summaries[0].total_words, 3000);
        assert_eq!(summaries[0].total_chunks, 1);
        assert!(!summaries[0].is_chunked);

        // The job started at the old size lands too late to be installed
        tokio::time::sleep(Duration::from_millis(700)).await;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, SessionEvent::Extracted(_)), "unexpected {:?}", event);
        }

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_chunk_size_change_after_extraction_rechunks() {
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::manual();

        let (session, mut events) =
            ReaderSession::spawn(pages(3, 1000), engine, engine_rx, &config(1000, false));
        session.send(Command::SetPageRange { start: 1, end: 3 });
        collect_until(&mut events, |e| matches!(e, SessionEvent::Extracted(_))).await;

        session.send(Command::SetChunkSize(5000));
        let seen = collect_until(&mut events, |e| matches!(e, SessionEvent::Extracted(_))).await;
        let summary = extracted(&seen).pop().unwrap();
        assert!(summary.success);
        assert_eq!(summary.total_chunks, 1);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_range_drops_queued_play() {
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = MockEngine::manual();
        let handle = engine.handle();

        let (session, mut events) =
            ReaderSession::spawn(slow_pages(3, 1000), engine, engine_rx, &config(1000, false));
        session.send(Command::SetPageRange { start: 1, end: 3 });
        session.send(Command::Play { from_chunk: Some(2) });
        session.send(Command::SetPageRange { start: 1, end: 1 });

        let seen = collect_until(&mut events, |e| {
            matches!(e, SessionEvent::Extracted(s) if s.page_range.end == 1)
        })
        .await;
        assert_eq!(extracted(&seen).len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::Playback(PlaybackEvent::Error(_))),
                "unexpected {:?}",
                event
            );
        }
        assert_eq!(handle.speak_count(), 0);

        session.shutdown().await;
    }
}
