//! Speech engine library for opra
//!
//! Provides one interface over every text-to-speech backend the reader can drive:
//! - System synthesizer binaries (espeak-ng, espeak, say, spd-say) run as subprocesses
//! - A scripted mock engine for tests
//!
//! Engines never call back into their owner. Everything they observe (started,
//! progress, finished, cancelled, failed) is sent as an [`EngineEvent`] on the
//! channel handed to them at construction, so the owner can serialize engine
//! events with its own control operations.

pub mod engine;
pub mod engines;
pub mod error;
pub mod settings;

pub use engine::{EngineEvent, EventKind, EventSender, SpeechEngine, UtteranceId, Voice};
pub use engines::{CommandEngine, EngineKind, MockEngine, MockHandle, SynthProgram, create_engine};
pub use error::{Result, SpeechError};
pub use settings::SpeechSettings;
