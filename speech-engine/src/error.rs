use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Failed to start speech: {0}")]
    SpeakFailed(String),

    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: &'static str,
        operation: &'static str,
    },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpeechError>;
