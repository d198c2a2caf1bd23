//! Format classification: which backend plays a given source.
//!
//! Two disjoint allowlists drive every decision. Anything the native engine
//! is not known to open goes to the universal engine, so classification is
//! total and never fails.

use serde::{Deserialize, Serialize};

use crate::MediaSource;

/// Containers and codecs the platform engine plays without help.
pub const NATIVE_EXTENSIONS: &[&str] = &[
    // Video
    "mp4", "mov", "m4v", "qt", // Audio
    "mp3", "m4a", "aac", "wav", "aiff", "caf",
];

/// Containers and codecs that need the universal engine's demux/decode stack.
pub const UNIVERSAL_EXTENSIONS: &[&str] = &[
    // Video
    "mkv", "webm", "avi", "flv", "wmv", "ogv", "3gp", "mpg", "mpeg", "vob", "ts", "mts", "m2ts",
    "divx", "xvid", // Audio
    "flac", "ogg", "opus", "wma", "ape", "mka",
];

/// Which backend engine handles a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Platform engine, fixed allowlist, push-based time reporting
    Native,
    /// General-purpose engine with its own demux/decode stack
    Universal,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "Native",
            Self::Universal => "Universal",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the allowlists see an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Native,
    Universal,
    Unlisted,
}

fn listing(extension: Option<&str>) -> Listing {
    match extension {
        Some(ext) if NATIVE_EXTENSIONS.contains(&ext) => Listing::Native,
        Some(ext) if UNIVERSAL_EXTENSIONS.contains(&ext) => Listing::Universal,
        _ => Listing::Unlisted,
    }
}

/// Choose the backend for a source.
///
/// Stream protocols (anything but `file`, `http` and `https`) always go to
/// the universal engine. File-like sources are classified by extension, and
/// unknown extensions fall back to the universal engine as well.
///
/// # Examples
///
/// ```
/// use common::{BackendKind, MediaSource, classify};
///
/// let mp4 = MediaSource::new("movie.mp4").unwrap();
/// let mkv = MediaSource::new("movie.mkv").unwrap();
/// let odd = MediaSource::new("stream.xyz").unwrap();
///
/// assert_eq!(classify(&mp4), BackendKind::Native);
/// assert_eq!(classify(&mkv), BackendKind::Universal);
/// assert_eq!(classify(&odd), BackendKind::Universal);
/// ```
pub fn classify(source: &MediaSource) -> BackendKind {
    if source.is_stream_protocol() {
        return BackendKind::Universal;
    }

    match listing(source.extension()) {
        Listing::Native => BackendKind::Native,
        Listing::Universal | Listing::Unlisted => BackendKind::Universal,
    }
}

/// Same decision as [`classify`], named for UI call sites.
pub fn requires_backend(source: &MediaSource) -> BackendKind {
    classify(source)
}

/// Human readable format badge, e.g. `"MKV (Universal)"`.
///
/// Backed by the same allowlists as [`classify`] so the badge always agrees
/// with the backend that will actually be used.
pub fn format_description(source: &MediaSource) -> String {
    let label = match source.extension() {
        Some(ext) => ext.to_ascii_uppercase(),
        None => match source.scheme() {
            Some(scheme) if source.is_network() => {
                format!("{} stream", scheme.to_ascii_uppercase())
            }
            _ => "Unknown".to_string(),
        },
    };

    let qualifier = if source.is_stream_protocol() {
        BackendKind::Universal.name()
    } else {
        match listing(source.extension()) {
            Listing::Native => BackendKind::Native.name(),
            Listing::Universal => BackendKind::Universal.name(),
            Listing::Unlisted if source.extension().is_some() => "Unknown",
            Listing::Unlisted => BackendKind::Universal.name(),
        }
    };

    format!("{} ({})", label, qualifier)
}
