//! opra configuration management.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use speech_engine::{EngineKind, SpeechSettings};
use std::fs;
use std::path::{Path, PathBuf};

use crate::extraction::ExtractionOptions;
use crate::playback::SequencerConfig;
use crate::text::{DEFAULT_CHUNK_SIZE, clamp_chunk_size};

const DEFAULT_STALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ENGINE: &str = "auto";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Word count above which extracted text is split into chunks (1000-50000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Speak the `--- Page N ---` markers between pages
    #[serde(default)]
    pub speak_page_markers: bool,

    /// Seconds without a response from the engine before playback is abandoned
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,

    /// Start reading as soon as extraction completes
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Speech engine: auto, mock, or a synthesizer binary name
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Rate, pitch, volume and voice handed to the engine
    #[serde(default)]
    pub speech: SpeechSettings,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_stall_timeout_secs() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}

fn default_auto_start() -> bool {
    true
}

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            speak_page_markers: false,
            stall_timeout_secs: default_stall_timeout_secs(),
            auto_start: default_auto_start(),
            engine: default_engine(),
            speech: SpeechSettings::default(),
        }
    }
}

impl ReaderConfig {
    /// Get the config file path: <config dir>/opra/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("opra").join("config.toml"))
    }

    /// Load config from the default path, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ReaderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Pull every value into its supported range, warning about each change.
    pub fn sanitized(mut self) -> Self {
        self.chunk_size = clamp_chunk_size(self.chunk_size);

        if self.stall_timeout_secs == 0 {
            warn!("stall_timeout_secs must be positive, using {}", DEFAULT_STALL_TIMEOUT_SECS);
            self.stall_timeout_secs = DEFAULT_STALL_TIMEOUT_SECS;
        }

        let speech = self.speech.clone().clamped();
        if speech != self.speech {
            warn!(
                "Speech settings adjusted to rate {}, pitch {}, volume {}",
                speech.rate, speech.pitch, speech.volume
            );
            self.speech = speech;
        }

        self
    }

    /// The configured engine; unknown names fall back to auto-detection.
    pub fn engine_kind(&self) -> EngineKind {
        EngineKind::from_str(&self.engine).unwrap_or_else(|e| {
            warn!("{}; falling back to auto", e);
            EngineKind::Auto
        })
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions::default()
            .with_chunk_size(self.chunk_size)
            .with_speak_page_markers(self.speak_page_markers)
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig::default().with_stall_timeout_secs(self.stall_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.chunk_size, 10_000);
        assert!(!config.speak_page_markers);
        assert_eq!(config.stall_timeout_secs, 30);
        assert!(config.auto_start);
        assert_eq!(config.engine, "auto");
        assert_eq!(config.speech, SpeechSettings::default());
    }

    #[test]
    fn test_config_path() {
        if let Ok(path) = ReaderConfig::config_path() {
            assert!(path.ends_with("opra/config.toml"));
        }
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
chunk_size = 2000
speak_page_markers = true
engine = "espeak-ng"

[speech]
rate = 0.7
voice = "en-us"
"#;
        let config: ReaderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chunk_size, 2000);
        assert!(config.speak_page_markers);
        assert_eq!(config.engine, "espeak-ng");
        assert_eq!(config.speech.rate, 0.7);
        assert_eq!(config.speech.pitch, 1.0);
        assert_eq!(config.speech.voice.as_deref(), Some("en-us"));
        assert_eq!(config.stall_timeout_secs, 30);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: ReaderConfig = toml::from_str("").unwrap();
        assert_eq!(config, ReaderConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ReaderConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, ReaderConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ReaderConfig::default();
        config.chunk_size = 4000;
        config.engine = "mock".to_string();
        config.speech = SpeechSettings::default().with_rate(0.8).with_voice("mock-de");
        config.save_to(&path).unwrap();

        let loaded = ReaderConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_out_of_range_values_clamped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "chunk_size = 5\nstall_timeout_secs = 0\n[speech]\nrate = 3.0\npitch = 0.1\n",
        )
        .unwrap();

        let config = ReaderConfig::load_from(&path).unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.stall_timeout_secs, 30);
        assert_eq!(config.speech.rate, 1.0);
        assert_eq!(config.speech.pitch, 0.5);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "chunk_size = \"lots\"").unwrap();
        assert!(ReaderConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = ReaderConfig::default();
        config.chunk_size = 2500;
        config.speak_page_markers = true;
        config.stall_timeout_secs = 10;
        config.engine = "bogus".to_string();

        let options = config.extraction_options();
        assert_eq!(options.chunk_size, 2500);
        assert!(options.speak_page_markers);
        assert_eq!(config.sequencer_config().stall_timeout, Duration::from_secs(10));
        assert_eq!(config.engine_kind(), EngineKind::Auto);
    }
}
