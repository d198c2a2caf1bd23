use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{
    Command, EffectsPatch, MediaDuration, MediaSource, PlaybackState, PlayerPhase, Response,
    format_description, format_timestamp, requires_backend,
};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

#[derive(Parser)]
#[command(name = "wavectl")]
#[command(about = "Wave playback daemon control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a media file or network stream
    Open {
        /// Local path or URI (http, https, rtsp, rtmp, ...)
        source: String,

        /// Load without starting playback
        #[arg(short, long)]
        paused: bool,
    },

    /// Resume playback
    Play,

    /// Pause playback
    Pause,

    /// Toggle between playing and paused
    Toggle,

    /// Seek to a position (seconds, m:ss or h:mm:ss)
    Seek {
        #[arg(value_parser = parse_position)]
        position: f64,
    },

    /// Jump forward (defaults to the daemon's skip step)
    Forward {
        #[arg(value_parser = parse_position)]
        seconds: Option<f64>,
    },

    /// Jump backward (defaults to the daemon's skip step)
    Back {
        #[arg(value_parser = parse_position)]
        seconds: Option<f64>,
    },

    /// Set volume (0.0-1.0)
    Volume { level: f32 },

    /// Adjust cosmetic video effects
    Effects {
        /// Brightness (-1.0 to 1.0)
        #[arg(long, allow_hyphen_values = true)]
        brightness: Option<f32>,

        /// Contrast (0.0 to 4.0)
        #[arg(long)]
        contrast: Option<f32>,

        /// Saturation (0.0 to 4.0)
        #[arg(long)]
        saturation: Option<f32>,

        /// Hue rotation in radians (-π to π)
        #[arg(long, allow_hyphen_values = true)]
        hue: Option<f32>,

        /// Enable or disable noise reduction
        #[arg(long)]
        noise_reduction: Option<bool>,

        /// Enable or disable HDR tone mapping
        #[arg(long)]
        tone_mapping: Option<bool>,
    },

    /// Restore default video effects
    ResetEffects,

    /// Stop playback and release the backend
    Close,

    /// Show the current playback state
    Status,

    /// Follow playback state until interrupted
    Watch,

    /// List recently opened network streams
    Recent,

    /// Show which backend a source would use (no daemon needed)
    Info { source: String },

    /// Check if daemon is running
    Ping,

    /// Kill the daemon
    Kill,
}

#[derive(Debug, Error, PartialEq)]
enum PositionError {
    #[error("empty position")]
    Empty,
    #[error("invalid number '{0}'")]
    Number(String),
    #[error("too many ':' separators in '{0}'")]
    Format(String),
    #[error("'{0}' must be under 60 in m:ss / h:mm:ss")]
    Component(String),
}

/// Parse `90`, `12.5`, `1:30` or `1:02:03` into seconds.
fn parse_position(input: &str) -> Result<f64, PositionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PositionError::Empty);
    }

    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() > 3 {
        return Err(PositionError::Format(input.to_string()));
    }

    let number = |part: &str| -> Result<f64, PositionError> {
        part.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| PositionError::Number(part.to_string()))
    };

    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let value = number(part)?;
        // Everything after the leading field is a base-60 digit
        if i > 0 && value >= 60.0 {
            return Err(PositionError::Component(part.to_string()));
        }
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// Make relative local paths absolute so the daemon resolves them against
/// the caller's working directory. URIs and `~` paths pass through.
fn absolutize(source: &str) -> Result<String> {
    if source.contains("://") || source.starts_with('~') {
        return Ok(source.to_string());
    }

    let path = Path::new(source);
    if path.is_absolute() {
        return Ok(source.to_string());
    }

    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path: {}", source))?;
    Ok(absolute.display().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Open { source, paused } => Command::Load {
            source: absolutize(&source)?,
            paused,
        },
        Commands::Play => Command::Play,
        Commands::Pause => Command::Pause,
        Commands::Toggle => Command::TogglePlayPause,
        Commands::Seek { position } => Command::Seek { seconds: position },
        Commands::Forward { seconds } => Command::SkipForward { seconds },
        Commands::Back { seconds } => Command::SkipBackward { seconds },
        Commands::Volume { level } => Command::SetVolume { level },
        Commands::Effects {
            brightness,
            contrast,
            saturation,
            hue,
            noise_reduction,
            tone_mapping,
        } => {
            let patch = EffectsPatch {
                brightness,
                contrast,
                saturation,
                hue,
                noise_reduction,
                tone_mapping,
            };
            if patch.is_empty() {
                eprintln!("Nothing to change; pass at least one effect flag");
                std::process::exit(2);
            }
            Command::SetEffects { patch }
        }
        Commands::ResetEffects => Command::ResetEffects,
        Commands::Close => Command::Close,
        Commands::Status => Command::Status,
        Commands::Watch => Command::Watch,
        Commands::Recent => Command::RecentStreams,
        Commands::Info { source } => {
            print_info(&source)?;
            return Ok(());
        }
        Commands::Ping => Command::Ping,
        Commands::Kill => Command::Kill,
    };

    let watch = matches!(command, Command::Watch);
    let result = match Connection::open().await {
        Ok(mut conn) if watch => conn.watch(command).await,
        Ok(mut conn) => conn.send(command).await.map(handle_response),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        eprintln!("\nIs the daemon running? Try starting it with: wave");
        std::process::exit(1);
    }
    Ok(())
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open() -> Result<Self> {
        let socket_path = common::get_socket_path();
        let stream = UnixStream::connect(&socket_path)
            .await
            .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn write(&mut self, command: &Command) -> Result<()> {
        let command_json = serde_json::to_string(command)?;
        self.writer.write_all(command_json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read one response; `None` once the daemon closes the connection.
    async fn read(&mut self) -> Result<Option<Response>> {
        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&response_line)?))
    }

    async fn send(&mut self, command: Command) -> Result<Response> {
        self.write(&command).await?;
        self.read()
            .await?
            .context("Daemon closed the connection without responding")
    }

    async fn watch(&mut self, command: Command) -> Result<()> {
        self.write(&command).await?;
        while let Some(response) = self.read().await? {
            match response {
                Response::State(state) => println!("{}", status_line(&state)),
                other => handle_response(other),
            }
        }
        Ok(())
    }
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::State(state) => print_state(&state),
        Response::Recent(streams) => {
            if streams.is_empty() {
                println!("No recent streams");
            } else {
                println!("Recent Streams:");
                for stream in streams {
                    println!("  {}", stream);
                }
            }
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
    }
}

fn phase_label(phase: &PlayerPhase) -> String {
    match phase {
        PlayerPhase::Idle => "idle".to_string(),
        PlayerPhase::Loading => "loading".to_string(),
        PlayerPhase::Ready => "ready".to_string(),
        PlayerPhase::Failed { reason } => format!("failed ({})", reason),
    }
}

fn time_label(state: &PlaybackState) -> String {
    let position = format_timestamp(state.current_time_secs);
    match state.duration {
        MediaDuration::Finite(total) => format!("{} / {}", position, format_timestamp(total)),
        MediaDuration::Indefinite => format!("{} / live", position),
        MediaDuration::Unknown => format!("{} / --:--", position),
    }
}

/// One-line summary used by `watch`.
fn status_line(state: &PlaybackState) -> String {
    let icon = if state.is_playing { "▶" } else { "⏸" };
    let source = state
        .source
        .as_ref()
        .map_or("-".to_string(), |s| s.locator().to_string());
    format!(
        "{} {} [{}] vol {:.0}% {}",
        icon,
        time_label(state),
        phase_label(&state.phase),
        state.volume * 100.0,
        source
    )
}

fn print_state(state: &PlaybackState) {
    println!("Playback Status:");
    match &state.source {
        Some(source) => println!("  Source: {}", source),
        None => println!("  Source: (none)"),
    }
    println!("  Phase: {}", phase_label(&state.phase));
    match state.backend_kind {
        Some(kind) => println!("  Backend: {}", kind),
        None => println!("  Backend: (none)"),
    }
    println!("  Playing: {}", if state.is_playing { "yes" } else { "no" });
    println!("  Time: {}", time_label(state));
    if let Some(progress) = state.progress() {
        println!("  Progress: {:.1}%", progress * 100.0);
    }
    if let Some(target) = state.pending_seek_secs {
        println!("  Seeking to: {}", format_timestamp(target));
    }
    println!("  Volume: {:.0}%", state.volume * 100.0);

    let effects = &state.effects;
    println!(
        "  Effects: brightness {:.2}, contrast {:.2}, saturation {:.2}, hue {:.2}",
        effects.brightness, effects.contrast, effects.saturation, effects.hue
    );
    println!(
        "           noise reduction {}, tone mapping {}",
        if effects.noise_reduction { "on" } else { "off" },
        if effects.tone_mapping { "on" } else { "off" }
    );
}

fn print_info(source: &str) -> Result<()> {
    let source = MediaSource::new(source)?;
    println!("Source: {}", source);
    println!("  Format: {}", format_description(&source));
    println!("  Backend: {}", requires_backend(&source));
    if source.is_network() {
        println!("  Network: yes");
    }
    Ok(())
}
