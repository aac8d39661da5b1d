//! Speech engine implementations

pub mod command;
pub mod mock;

pub use command::{CommandEngine, SynthProgram};
pub use mock::{MockEngine, MockHandle};

use crate::engine::{EventSender, SpeechEngine};
use crate::error::{Result, SpeechError};
use crate::settings::SpeechSettings;

/// Supported engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// First synthesizer binary found on PATH
    Auto,
    /// A specific synthesizer binary
    Program(SynthProgram),
    /// Mock engine that finishes every utterance immediately
    Mock,
}

impl EngineKind {
    /// Parse engine kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" | "system" | "command" => Ok(Self::Auto),
            "mock" => Ok(Self::Mock),
            other => SynthProgram::from_str(other)
                .map(Self::Program)
                .ok_or_else(|| SpeechError::Config(format!("Unknown engine: {}", s))),
        }
    }

    /// Name as accepted by `from_str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Program(program) => program.binary(),
            Self::Mock => "mock",
        }
    }
}

/// Create an engine instance
///
/// The engine publishes its events on `events`. The platform decision is
/// made here, once; callers only ever see `dyn SpeechEngine`.
pub fn create_engine(
    kind: EngineKind,
    settings: SpeechSettings,
    events: EventSender,
) -> Result<Box<dyn SpeechEngine>> {
    match kind {
        EngineKind::Auto => Ok(Box::new(CommandEngine::detect(settings, events)?)),
        EngineKind::Program(program) => {
            Ok(Box::new(CommandEngine::new(program, settings, events)?))
        }
        EngineKind::Mock => {
            let mut engine = MockEngine::auto_finishing(events);
            engine.set_settings(settings);
            Ok(Box::new(engine))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!(EngineKind::from_str("auto").unwrap(), EngineKind::Auto);
        assert_eq!(EngineKind::from_str("System").unwrap(), EngineKind::Auto);
        assert_eq!(EngineKind::from_str("mock").unwrap(), EngineKind::Mock);
        assert_eq!(
            EngineKind::from_str("espeak-ng").unwrap(),
            EngineKind::Program(SynthProgram::EspeakNg)
        );
        assert!(EngineKind::from_str("festival").is_err());
    }

    #[test]
    fn test_engine_kind_round_trip_name() {
        for kind in [
            EngineKind::Auto,
            EngineKind::Mock,
            EngineKind::Program(SynthProgram::Say),
        ] {
            assert_eq!(EngineKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_create_mock_engine() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let settings = SpeechSettings::new().with_rate(0.8);
        let engine = create_engine(EngineKind::Mock, settings.clone(), tx).unwrap();
        assert_eq!(engine.name(), "mock");
        assert_eq!(engine.settings(), &settings);
    }
}
