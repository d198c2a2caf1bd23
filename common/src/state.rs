//! The published playback record.
//!
//! [`PlaybackState`] is the one normalized view of playback that every
//! collaborator renders. The daemon owns the only writable copy; clients only
//! ever see snapshots of it.

use serde::{Deserialize, Serialize};

use crate::{BackendKind, MediaSource};

/// Coarse lifecycle of the current load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum PlayerPhase {
    /// No backend loaded
    #[default]
    Idle,
    /// Backend constructed, waiting for it to report ready
    Loading,
    /// Backend has reported ready at least once
    Ready,
    /// Backend never became ready or reported an error
    Failed { reason: String },
}

/// Media length as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum MediaDuration {
    /// Not determined yet (no backend, or backend still preparing)
    #[default]
    Unknown,
    /// Known length in seconds
    Finite(f64),
    /// Ready but unbounded, e.g. a live stream
    Indefinite,
}

impl MediaDuration {
    /// Build from a length in seconds; non-finite or non-positive lengths
    /// mean the media is unbounded.
    pub fn from_secs(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self::Finite(secs)
        } else {
            Self::Indefinite
        }
    }

    /// Seconds for display and slider ranges: `0.0` until known, infinity
    /// for unbounded media.
    pub fn as_secs(&self) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::Finite(secs) => *secs,
            Self::Indefinite => f64::INFINITY,
        }
    }

    pub fn finite_secs(&self) -> Option<f64> {
        match self {
            Self::Finite(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Cosmetic picture settings. Stored and published, not applied to any
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoEffects {
    /// -1.0 ..= 1.0
    pub brightness: f32,
    /// 0.0 ..= 4.0
    pub contrast: f32,
    /// 0.0 ..= 4.0
    pub saturation: f32,
    /// -π ..= π (radians)
    pub hue: f32,
    pub noise_reduction: bool,
    pub tone_mapping: bool,
}

impl Default for VideoEffects {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            noise_reduction: false,
            tone_mapping: false,
        }
    }
}

impl VideoEffects {
    /// Apply the fields present in `patch`, clamping each to its range.
    pub fn apply(&mut self, patch: &EffectsPatch) {
        if let Some(v) = patch.brightness {
            self.brightness = clamp_finite(v, -1.0, 1.0, self.brightness);
        }
        if let Some(v) = patch.contrast {
            self.contrast = clamp_finite(v, 0.0, 4.0, self.contrast);
        }
        if let Some(v) = patch.saturation {
            self.saturation = clamp_finite(v, 0.0, 4.0, self.saturation);
        }
        if let Some(v) = patch.hue {
            self.hue = clamp_finite(v, -std::f32::consts::PI, std::f32::consts::PI, self.hue);
        }
        if let Some(v) = patch.noise_reduction {
            self.noise_reduction = v;
        }
        if let Some(v) = patch.tone_mapping {
            self.tone_mapping = v;
        }
    }
}

/// Partial update for [`VideoEffects`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectsPatch {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub hue: Option<f32>,
    pub noise_reduction: Option<bool>,
    pub tone_mapping: Option<bool>,
}

impl EffectsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Clamp a requested volume into `0.0..=1.0`. NaN is treated as silence.
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Normalized playback state shared with every observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Kind of the active backend, if any
    pub backend_kind: Option<BackendKind>,
    /// True iff a backend adapter is currently loaded
    pub has_active_backend: bool,
    pub phase: PlayerPhase,
    /// Currently selected media
    pub source: Option<MediaSource>,
    pub is_playing: bool,
    /// Position in seconds; only meaningful with an active backend
    pub current_time_secs: f64,
    /// Seek target not yet confirmed by a backend sample
    pub pending_seek_secs: Option<f64>,
    pub duration: MediaDuration,
    /// 0.0 ..= 1.0
    pub volume: f32,
    pub effects: VideoEffects,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            backend_kind: None,
            has_active_backend: false,
            phase: PlayerPhase::Idle,
            source: None,
            is_playing: false,
            current_time_secs: 0.0,
            pending_seek_secs: None,
            duration: MediaDuration::Unknown,
            volume: 1.0,
            effects: VideoEffects::default(),
        }
    }
}

impl PlaybackState {
    /// Initial state with a configured starting volume.
    pub fn with_volume(volume: f32) -> Self {
        Self {
            volume: clamp_volume(volume),
            ..Self::default()
        }
    }

    /// Duration in seconds, `0.0` until the backend reports it.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs()
    }

    /// Playback progress in `0.0..=1.0`, when the length is known.
    pub fn progress(&self) -> Option<f64> {
        let total = self.duration.finite_secs()?;
        Some((self.current_time_secs / total).clamp(0.0, 1.0))
    }
}

/// Format seconds as `m:ss`, the way the player controls show time.
///
/// Minutes are not wrapped into hours; negative and non-finite input shows
/// as `0:00`.
///
/// # Examples
///
/// ```
/// use common::format_timestamp;
///
/// assert_eq!(format_timestamp(75.4), "1:15");
/// assert_eq!(format_timestamp(3725.0), "62:05");
/// ```
pub fn format_timestamp(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
