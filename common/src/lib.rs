//! Common types and utilities for Wave.
//!
//! This crate defines the shared data structures and IPC protocol used for
//! communication between the daemon (`wave`) and client (`wavectl`), plus the
//! pure format classifier both sides rely on.
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using newline-delimited
//! JSON messages. The client sends [`Command`] variants and receives
//! [`Response`] variants.
//!
//! # Examples
//!
//! ```no_run
//! use common::{Command, EffectsPatch};
//!
//! // Open a file and bump the contrast a little
//! let open = Command::Load {
//!     source: "/videos/holiday.mkv".to_string(),
//!     paused: false,
//! };
//! let effects = Command::SetEffects {
//!     patch: EffectsPatch {
//!         contrast: Some(1.2),
//!         ..Default::default()
//!     },
//! };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&open).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod format;
mod source;
mod state;

pub use format::{
    BackendKind, NATIVE_EXTENSIONS, UNIVERSAL_EXTENSIONS, classify, format_description,
    requires_backend,
};
pub use source::MediaSource;
pub use state::{
    EffectsPatch, MediaDuration, PlaybackState, PlayerPhase, VideoEffects, clamp_volume,
    format_timestamp,
};

/// Common error types shared between client and daemon.
///
/// All errors are serializable for transmission over IPC.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for PlayerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ipc(e.to_string())
    }
}

/// Commands sent from client to daemon via IPC.
///
/// Every playback command is fire-and-forget: the daemon answers as soon as
/// the command is queued for the player, and the effect shows up in the next
/// published [`PlaybackState`].
///
/// # Examples
///
/// ```
/// use common::Command;
///
/// let cmd = Command::Seek { seconds: 93.5 };
/// let json = serde_json::to_string(&cmd).unwrap();
/// assert!(json.contains("Seek"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Load a local path or network URI, replacing whatever is playing.
    Load {
        /// Absolute path, `~`-prefixed path, or URI
        source: String,
        /// Leave the new media paused instead of starting playback
        #[serde(default)]
        paused: bool,
    },
    Play,
    Pause,
    TogglePlayPause,
    /// Seek to an absolute position in seconds
    Seek { seconds: f64 },
    /// Jump forward; `None` uses the daemon's configured skip step
    SkipForward { seconds: Option<f64> },
    /// Jump backward; `None` uses the daemon's configured skip step
    SkipBackward { seconds: Option<f64> },
    /// Set volume, clamped to 0.0-1.0
    SetVolume { level: f32 },
    /// Update some of the cosmetic video effect fields
    SetEffects { patch: EffectsPatch },
    /// Restore default video effects
    ResetEffects,
    /// Tear down the active backend and return to idle
    Close,
    /// Query the current playback state
    Status,
    /// Subscribe to playback state; the daemon streams a `State` line for
    /// every published change until the client disconnects
    Watch,
    /// List recently opened network streams
    RecentStreams,
    /// Ping the daemon
    Ping,
    /// Kill the daemon
    Kill,
}

/// Response from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(PlayerError),
    State(PlaybackState),
    Recent(Vec<String>),
    Pong,
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir).join("wave.sock")
}
