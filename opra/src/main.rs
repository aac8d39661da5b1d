//! opra - read PDF documents aloud

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use speech_engine::{EngineKind, SpeechEngine, create_engine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use opra::config::ReaderConfig;
use opra::extraction::Coordinator;
use opra::pdf::{LopdfSource, MemorySource, PdfTextSource};
use opra::playback::PlaybackEvent;
use opra::session::{Command, ReaderSession, SessionEvent};
use opra::text::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, normalize, normalizer, word_count};

/// Page range argument: "4" or "3-5"
static PAGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").unwrap());

#[derive(Parser, Debug)]
#[command(name = "opra")]
#[command(about = "Read PDF documents aloud", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show page count and words per page
    Info {
        /// PDF file, or a pdftotext-style .txt file with form-feed page breaks
        file: PathBuf,
    },
    /// Extract, normalize and chunk a page range
    Extract {
        file: PathBuf,

        /// Page range (e.g., "3-5" or "4"); all pages when omitted
        #[arg(short, long)]
        pages: Option<String>,

        /// Words per chunk (1000-50000); config value when omitted
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Print the per-page text with page markers instead of chunks
        #[arg(long)]
        show_markers: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize text for speech (reads stdin when TEXT is omitted)
    Normalize { text: Option<String> },
    /// Read a document aloud
    Read {
        file: PathBuf,

        /// Page range (e.g., "3-5" or "4"); all pages when omitted
        #[arg(short, long)]
        pages: Option<String>,

        /// Chunk to start from (1-based)
        #[arg(long, default_value_t = 1)]
        from_chunk: usize,

        /// Speaking rate (0.0-1.0)
        #[arg(long)]
        rate: Option<f32>,

        /// Voice identifier or name
        #[arg(long)]
        voice: Option<String>,

        /// Engine: auto, mock, espeak-ng, espeak, say, spd-say
        #[arg(long)]
        engine: Option<String>,
    },
    /// List the voices an engine offers
    Voices {
        /// Engine: auto, mock, espeak-ng, espeak, say, spd-say
        #[arg(long)]
        engine: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set words per chunk
    SetChunkSize {
        /// Value (1000-50000)
        value: usize,
    },
    /// Set default speaking rate
    SetRate {
        /// Value (0.0-1.0)
        value: f32,
    },
    /// Set default voice; omit to use the engine default
    SetVoice { voice: Option<String> },
    /// Set default engine
    SetEngine {
        /// auto, mock, espeak-ng, espeak, say, spd-say
        name: String,
    },
    /// Speak page markers between pages
    SetSpeakMarkers {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Info { file } => handle_info(&file),
        Commands::Extract {
            file,
            pages,
            chunk_size,
            show_markers,
            json,
        } => handle_extract(&file, &pages, chunk_size, show_markers, json),
        Commands::Normalize { text } => handle_normalize(text),
        Commands::Read {
            file,
            pages,
            from_chunk,
            rate,
            voice,
            engine,
        } => handle_read(&file, &pages, from_chunk, rate, voice, engine).await,
        Commands::Voices { engine } => handle_voices(engine),
        Commands::Config { action } => handle_config_command(&action),
    }
}

/// Open a document as a shareable text source.
fn open_source(path: &Path) -> Result<Arc<dyn PdfTextSource>> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if is_text {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Arc::new(MemorySource::from_form_feeds(&text)));
    }

    Ok(Arc::new(LopdfSource::open(path)?))
}

/// Parse a page range string like "3-5" or "4". None selects every page.
fn parse_page_range(range: &Option<String>, total: u32) -> Result<(i64, i64)> {
    let Some(range) = range else {
        return Ok((1, i64::from(total)));
    };

    let caps = PAGE_RANGE
        .captures(range)
        .with_context(|| format!("Invalid page range '{}'. Use 'start-end' (e.g., '3-5')", range))?;
    let start: i64 = caps[1].parse().context("Invalid start page")?;
    let end: i64 = match caps.get(2) {
        Some(end) => end.as_str().parse().context("Invalid end page")?,
        None => start,
    };
    Ok((start, end))
}

fn resolve_engine(name: Option<&str>, config: &ReaderConfig) -> Result<EngineKind> {
    match name {
        Some(name) => Ok(EngineKind::from_str(name)?),
        None => Ok(config.engine_kind()),
    }
}

fn handle_info(file: &Path) -> Result<()> {
    let source = open_source(file)?;
    let total = source.page_count()?;
    println!("{}: {} page(s)", file.display(), total);

    let pb = ProgressBar::new(u64::from(total));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages")?
            .progress_chars("#>-"),
    );

    let mut counts = Vec::with_capacity(total as usize);
    for page in 1..=total {
        let text = source.page_text(page)?;
        let words = normalizer::normalize_content(&text).map_or(0, |t| word_count(&t));
        counts.push(words);
        pb.inc(1);
    }
    pb.finish_and_clear();

    for (i, words) in counts.iter().enumerate() {
        println!("  Page {:>4}: {} words", i + 1, words);
    }
    println!("Total: {} words", counts.iter().sum::<usize>());
    Ok(())
}

fn handle_extract(
    file: &Path,
    pages: &Option<String>,
    chunk_size: Option<usize>,
    show_markers: bool,
    json: bool,
) -> Result<()> {
    let config = ReaderConfig::load().context("Failed to load configuration")?;
    let mut options = config.extraction_options();
    if let Some(size) = chunk_size {
        options = options.with_chunk_size(size);
    }

    let source = open_source(file)?;
    let total = source.page_count()?;
    let (start, end) = parse_page_range(pages, total)?;

    let mut coordinator = Coordinator::new(source, options);
    let result = coordinator.set_page_range(start, end);

    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if !result.success {
        anyhow::bail!(
            "Extraction failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    eprintln!(
        "Extracted {}: {} words, {} chunk(s){}",
        result.page_range,
        result.total_words(),
        result.total_chunks(),
        if result.is_chunked { "" } else { " (not chunked)" }
    );

    if show_markers {
        println!("{}", result.full_text);
    } else {
        for chunk in &result.chunks {
            println!("=== Chunk {} ({} words) ===", chunk.index + 1, chunk.word_count);
            println!("{}\n", chunk.text);
        }
    }
    Ok(())
}

fn handle_normalize(text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    println!("{}", normalize(&text));
    Ok(())
}

async fn handle_read(
    file: &Path,
    pages: &Option<String>,
    from_chunk: usize,
    rate: Option<f32>,
    voice: Option<String>,
    engine: Option<String>,
) -> Result<()> {
    let mut config = ReaderConfig::load().context("Failed to load configuration")?;
    if let Some(rate) = rate {
        config.speech = config.speech.with_rate(rate);
    }
    // Playback starts explicitly below so --from-chunk is honoured
    config.auto_start = false;

    let source = open_source(file)?;
    let total = source.page_count()?;
    let (start, end) = parse_page_range(pages, total)?;

    let kind = resolve_engine(engine.as_deref(), &config)?;
    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let mut engine = create_engine(kind, config.speech.clone(), engine_tx)
        .context("Failed to create speech engine")?;
    log::debug!("Using {} engine", engine.name());

    if let Some(voice) = voice {
        if let Err(e) = engine.set_voice(&voice) {
            log::warn!("{}; passing '{}' to {} as-is", e, voice, engine.name());
            let settings = engine.settings().clone().with_voice(voice);
            engine.set_settings(settings);
        }
    }

    let (session, mut events) = ReaderSession::spawn(source, engine, engine_rx, &config);
    session.send(Command::SetPageRange { start, end });
    session.send(Command::Play {
        from_chunk: Some(from_chunk.saturating_sub(1)),
    });

    eprintln!("Commands: p pause, r resume, s stop, n next chunk, b previous chunk, q quit");

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent}% {msg}")?
            .progress_chars("#>-"),
    );

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut stopped = true;
    let mut total_chunks = 0;

    loop {
        tokio::select! {
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let command = match line.trim() {
                        "p" => Some(Command::Pause),
                        "r" if stopped => Some(Command::Play { from_chunk: None }),
                        "r" => Some(Command::Resume),
                        "s" => Some(Command::Stop),
                        "n" => Some(Command::NextChunk),
                        "b" => Some(Command::PreviousChunk),
                        "q" => break,
                        "" => None,
                        other => {
                            pb.println(format!("Unknown command '{}' (p r s n b q)", other));
                            None
                        }
                    };
                    if let Some(command) = command {
                        session.send(command);
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::ExtractionStarted(range) => {
                        pb.set_message(format!("Extracting {}", range));
                    }
                    SessionEvent::Extracted(summary) => {
                        if !summary.success {
                            pb.abandon();
                            session.shutdown().await;
                            anyhow::bail!(
                                "Extraction failed: {}",
                                summary.error_message.as_deref().unwrap_or("unknown error")
                            );
                        }
                        total_chunks = summary.total_chunks;
                        pb.println(format!(
                            "Extracted {}: {} words, {} chunk(s)",
                            summary.page_range, summary.total_words, summary.total_chunks
                        ));
                    }
                    SessionEvent::Playback(event) => match event {
                        PlaybackEvent::ChunkStarted { index } => {
                            stopped = false;
                            pb.set_message(format!("Chunk {}/{}", index + 1, total_chunks));
                        }
                        PlaybackEvent::Progress(snapshot) => {
                            pb.set_position((snapshot.progress * 1000.0) as u64);
                        }
                        PlaybackEvent::Paused => pb.set_message("Paused"),
                        PlaybackEvent::Resumed => pb.set_message("Resumed"),
                        PlaybackEvent::Finished => {
                            pb.set_position(1000);
                            pb.finish_with_message("Finished");
                            break;
                        }
                        PlaybackEvent::Stopped => {
                            stopped = true;
                            pb.set_message("Stopped");
                            if !stdin_open {
                                break;
                            }
                        }
                        PlaybackEvent::Error(e) => pb.println(format!("Error: {}", e)),
                    },
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn handle_voices(engine: Option<String>) -> Result<()> {
    let config = ReaderConfig::load().context("Failed to load configuration")?;
    let kind = resolve_engine(engine.as_deref(), &config)?;

    let (engine_tx, _engine_rx) = mpsc::unbounded_channel();
    let engine = create_engine(kind, config.speech.clone(), engine_tx)
        .context("Failed to create speech engine")?;

    let voices = engine.voices()?;
    if voices.is_empty() {
        println!("{} reports no voices", engine.name());
        return Ok(());
    }

    println!("Voices for {}:", engine.name());
    for voice in voices {
        println!(
            "  {:<24} {:<32} {}{}",
            voice.id,
            voice.name,
            voice.language,
            if voice.is_default { " (default)" } else { "" }
        );
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = ReaderConfig::load()?;
            println!("Configuration file: {:?}", ReaderConfig::config_path()?);
            println!();
            println!("chunk_size = {}", config.chunk_size);
            println!("speak_page_markers = {}", config.speak_page_markers);
            println!("stall_timeout_secs = {}", config.stall_timeout_secs);
            println!("auto_start = {}", config.auto_start);
            println!("engine = \"{}\"", config.engine);
            println!("rate = {}", config.speech.rate);
            println!("pitch = {}", config.speech.pitch);
            println!("volume = {}", config.speech.volume);
            if let Some(voice) = &config.speech.voice {
                println!("voice = \"{}\"", voice);
            } else {
                println!("voice = (engine default)");
            }
        }
        ConfigAction::SetChunkSize { value } => {
            let mut config = ReaderConfig::load()?;
            config.chunk_size = (*value).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
            config.save()?;
            println!("Chunk size set to: {}", config.chunk_size);
        }
        ConfigAction::SetRate { value } => {
            let mut config = ReaderConfig::load()?;
            config.speech = config.speech.with_rate(*value);
            config.save()?;
            println!("Default rate set to: {}", config.speech.rate);
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = ReaderConfig::load()?;
            config.speech.voice = voice.clone();
            config.save()?;
            match voice {
                Some(voice) => println!("Default voice set to: {}", voice),
                None => println!("Default voice cleared"),
            }
        }
        ConfigAction::SetEngine { name } => {
            let kind = EngineKind::from_str(name)?;
            let mut config = ReaderConfig::load()?;
            config.engine = kind.as_str().to_string();
            config.save()?;
            println!("Default engine set to: {}", config.engine);
        }
        ConfigAction::SetSpeakMarkers { enabled } => {
            let mut config = ReaderConfig::load()?;
            config.speak_page_markers = *enabled;
            config.save()?;
            println!("Speak page markers: {}", enabled);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_range() {
        assert_eq!(parse_page_range(&None, 12).unwrap(), (1, 12));
        assert_eq!(parse_page_range(&Some("3-5".into()), 12).unwrap(), (3, 5));
        assert_eq!(parse_page_range(&Some(" 4 ".into()), 12).unwrap(), (4, 4));
        assert_eq!(parse_page_range(&Some("2 - 9999".into()), 12).unwrap(), (2, 9999));
        assert!(parse_page_range(&Some("a-b".into()), 12).is_err());
        assert!(parse_page_range(&Some("1-2-3".into()), 12).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["opra", "-d", "extract", "doc.pdf", "--pages", "2-3"]).unwrap();
        assert!(args.debug);
        assert!(matches!(args.command, Commands::Extract { pages: Some(ref p), .. } if p == "2-3"));

        let args = Args::try_parse_from(["opra", "config", "set-speak-markers", "true"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Config { action: ConfigAction::SetSpeakMarkers { enabled: true } }
        ));
    }
}
