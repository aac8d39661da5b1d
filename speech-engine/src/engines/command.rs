//! Subprocess speech engine
//!
//! Drives a system synthesizer binary (espeak-ng, espeak, say, spd-say) as a
//! child process. Text goes in over stdin, so chunk size is not bounded by
//! the argument length limit. Completion is observed by waiting on the child
//! in a tokio task; pause and resume suspend the child process on Unix.

use std::path::PathBuf;
use std::process::Stdio;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::engine::{EngineEvent, EventKind, EventSender, SpeechEngine, UtteranceId, Voice};
use crate::error::{Result, SpeechError};
use crate::settings::SpeechSettings;

/// Synthesizer binaries the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthProgram {
    EspeakNg,
    Espeak,
    Say,
    SpdSay,
}

impl SynthProgram {
    /// Detection order for [`CommandEngine::detect`]
    pub const ALL: [SynthProgram; 4] = [Self::EspeakNg, Self::Espeak, Self::Say, Self::SpdSay];

    /// Binary name looked up on PATH
    pub fn binary(&self) -> &'static str {
        match self {
            Self::EspeakNg => "espeak-ng",
            Self::Espeak => "espeak",
            Self::Say => "say",
            Self::SpdSay => "spd-say",
        }
    }

    /// Parse from a binary name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "espeak-ng" | "espeak_ng" => Some(Self::EspeakNg),
            "espeak" => Some(Self::Espeak),
            "say" => Some(Self::Say),
            "spd-say" | "spd_say" | "speech-dispatcher" => Some(Self::SpdSay),
            _ => None,
        }
    }

    /// Arguments for speaking text read from stdin
    fn speak_args(&self, settings: &SpeechSettings) -> Vec<String> {
        let wpm = settings.words_per_minute().round() as i32;
        let mut args: Vec<String> = Vec::new();

        match self {
            Self::EspeakNg | Self::Espeak => {
                // espeak pitch is 0-99 with 50 as neutral; amplitude 0-200 with 100 as normal
                let pitch = (settings.pitch * 50.0).round().clamp(0.0, 99.0) as i32;
                let amplitude = (settings.volume * 100.0).round() as i32;
                args.extend(["--stdin".to_string(), "-s".to_string(), wpm.to_string()]);
                args.extend(["-p".to_string(), pitch.to_string()]);
                args.extend(["-a".to_string(), amplitude.to_string()]);
                if let Some(voice) = &settings.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
            }
            Self::Say => {
                args.extend(["-r".to_string(), wpm.to_string()]);
                if let Some(voice) = &settings.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
                args.extend(["-f".to_string(), "-".to_string()]);
            }
            Self::SpdSay => {
                // speech-dispatcher takes -100..100 for rate, pitch and volume
                let rate = (settings.rate * 200.0 - 100.0).round() as i32;
                let pitch = ((settings.pitch - 1.0) * 100.0).round().clamp(-100.0, 100.0) as i32;
                let volume = (settings.volume * 200.0 - 100.0).round() as i32;
                args.extend(["-e".to_string(), "-w".to_string()]);
                args.extend(["-r".to_string(), rate.to_string()]);
                args.extend(["-p".to_string(), pitch.to_string()]);
                args.extend(["-i".to_string(), volume.to_string()]);
                if let Some(voice) = &settings.voice {
                    args.extend(["-y".to_string(), voice.clone()]);
                }
            }
        }

        args
    }

    /// Arguments that list available voices
    fn voices_args(&self) -> &'static [&'static str] {
        match self {
            Self::EspeakNg | Self::Espeak => &["--voices"],
            Self::Say => &["-v", "?"],
            Self::SpdSay => &["-L"],
        }
    }

    /// Parse the voice listing printed by `voices_args`
    fn parse_voices(&self, output: &str) -> Vec<Voice> {
        match self {
            Self::EspeakNg | Self::Espeak => parse_espeak_voices(output),
            Self::Say => parse_say_voices(output),
            Self::SpdSay => parse_spd_voices(output),
        }
    }
}

/// Parse `espeak --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(Voice {
                id: fields[1].to_string(),
                name: fields[3].replace('_', " "),
                language: fields[1].to_string(),
                is_default: false,
            })
        })
        .collect()
}

/// Parse `say -v ?` output.
///
/// ```text
/// Alex                en_US    # Most people recognize me by my voice.
/// Good News           en_US    # We've won!
/// ```
fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let left = line.split('#').next()?.trim();
            let (name, language) = left.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Voice {
                id: name.to_string(),
                name: name.to_string(),
                language: language.to_string(),
                is_default: false,
            })
        })
        .collect()
}

/// Parse `spd-say -L` output.
///
/// ```text
///      NAME                     LANGUAGE                 VARIANT
///      afrikaans                af                       none
/// ```
fn parse_spd_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 || fields[0] == "NAME" {
                return None;
            }
            Some(Voice {
                id: fields[0].to_string(),
                name: fields[0].to_string(),
                language: fields[1].to_string(),
                is_default: false,
            })
        })
        .collect()
}

/// The child process currently speaking
struct Playing {
    utterance: UtteranceId,
    pid: Option<u32>,
    cancel: oneshot::Sender<()>,
    paused: bool,
}

/// Engine that speaks through a synthesizer subprocess
pub struct CommandEngine {
    program: SynthProgram,
    path: PathBuf,
    settings: SpeechSettings,
    events: EventSender,
    playing: Option<Playing>,
}

impl CommandEngine {
    /// Create an engine for a specific synthesizer
    ///
    /// Returns an error if the binary is not on PATH.
    pub fn new(program: SynthProgram, settings: SpeechSettings, events: EventSender) -> Result<Self> {
        let path = which::which(program.binary()).map_err(|_| {
            SpeechError::EngineUnavailable(format!("{} not found in PATH", program.binary()))
        })?;

        Ok(Self {
            program,
            path,
            settings,
            events,
            playing: None,
        })
    }

    /// Create an engine for the first synthesizer found on PATH
    pub fn detect(settings: SpeechSettings, events: EventSender) -> Result<Self> {
        for program in SynthProgram::ALL {
            if which::which(program.binary()).is_ok() {
                debug!("Using speech synthesizer {}", program.binary());
                return Self::new(program, settings, events);
            }
        }

        Err(SpeechError::EngineUnavailable(
            "No speech synthesizer found. Install espeak-ng (Linux) or use say (macOS).".into(),
        ))
    }

    /// The synthesizer this engine drives
    pub fn program(&self) -> SynthProgram {
        self.program
    }

    /// Send a job-control signal to the child
    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        send_signal(pid, signal)
    }

    #[cfg(not(unix))]
    fn signal(&self, _pid: u32, signal: &str) -> Result<()> {
        Err(SpeechError::Unsupported {
            engine: self.name(),
            operation: if signal == "-STOP" { "pause" } else { "resume" },
        })
    }

    /// The playing child, unless it has already exited
    fn live_child(&self) -> Option<&Playing> {
        self.playing.as_ref().filter(|p| !p.cancel.is_closed())
    }
}

/// Run `kill <signal> <pid>`; a non-zero exit is an error.
#[cfg(unix)]
fn send_signal(pid: u32, signal: &str) -> Result<()> {
    let status = std::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .status()?;
    if !status.success() {
        warn!("kill {} {} exited with {}", signal, pid, status);
        return Err(SpeechError::Signal {
            pid,
            reason: format!("kill {} exited with {}", signal, status),
        });
    }
    Ok(())
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &'static str {
        self.program.binary()
    }

    fn speak(&mut self, utterance: UtteranceId, text: &str) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SpeechError::EngineUnavailable(format!(
                "{} requires a running tokio runtime",
                self.name()
            )));
        }

        self.stop();

        let mut child = Command::new(&self.path)
            .args(self.program.speak_args(&self.settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SpeechError::SpeakFailed(format!("Failed to execute {}: {}", self.name(), e))
            })?;

        let pid = child.id();
        debug!("{} speaking {} (pid {:?})", self.name(), utterance, pid);

        // Feed stdin separately: the synthesizer may not drain the pipe until
        // it has spoken the beginning, and a stop must not wait on that.
        if let Some(mut stdin) = child.stdin.take() {
            let text = text.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!("Synthesizer stdin closed early: {}", e);
                }
            });
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let events = self.events.clone();
        let program = self.program.binary();

        let _ = events.send(EngineEvent::new(utterance, EventKind::Started));

        tokio::spawn(async move {
            let kind = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => EventKind::Finished,
                    Ok(status) => EventKind::Failed(format!("{} exited with {}", program, status)),
                    Err(e) => EventKind::Failed(format!("Failed to wait for {}: {}", program, e)),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill {}: {}", program, e);
                    }
                    EventKind::Cancelled
                }
            };
            let _ = events.send(EngineEvent::new(utterance, kind));
        });

        self.playing = Some(Playing {
            utterance,
            pid,
            cancel: cancel_tx,
            paused: false,
        });

        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let Some(pid) = self.live_child().and_then(|p| p.pid) else {
            return Ok(());
        };
        self.signal(pid, "-STOP")?;
        if let Some(playing) = self.playing.as_mut() {
            playing.paused = true;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let Some(pid) = self.live_child().and_then(|p| p.pid) else {
            return Ok(());
        };
        self.signal(pid, "-CONT")?;
        if let Some(playing) = self.playing.as_mut() {
            playing.paused = false;
        }
        Ok(())
    }

    fn stop(&mut self) {
        let Some(playing) = self.playing.take() else {
            return;
        };

        if playing.paused {
            if let Some(pid) = playing.pid {
                if let Err(e) = self.signal(pid, "-CONT") {
                    warn!("Failed to continue stopped synthesizer: {}", e);
                }
            }
        }

        debug!("{} stopping {}", self.name(), playing.utterance);
        // Err means the child already exited on its own
        let _ = playing.cancel.send(());
    }

    fn settings(&self) -> &SpeechSettings {
        &self.settings
    }

    fn set_settings(&mut self, settings: SpeechSettings) {
        self.settings = settings;
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let output = std::process::Command::new(&self.path)
            .args(self.program.voices_args())
            .output()?;

        if !output.status.success() {
            return Err(SpeechError::EngineUnavailable(format!(
                "{} failed to list voices",
                self.name()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut voices = self.program.parse_voices(&stdout);
        if let Some(current) = &self.settings.voice {
            for voice in &mut voices {
                voice.is_default = &voice.id == current;
            }
        }
        Ok(voices)
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
