//! Media source locators.
//!
//! A [`MediaSource`] wraps whatever the user asked to play: a local path or a
//! network URI. The extension and scheme tokens are derived once at
//! construction so classification never has to re-parse the locator.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::PlayerError;

/// Schemes that name a concrete file-like resource. Everything else
/// (`rtsp`, `rtmp`, `udp`, ...) is a stream protocol.
const FILE_LIKE_SCHEMES: &[&str] = &["file", "http", "https"];

/// An immutable media locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    locator: String,
    scheme: Option<String>,
    extension: Option<String>,
}

impl MediaSource {
    /// Create a source from a local path or URI.
    ///
    /// Only an empty (or whitespace-only) locator is rejected; anything else
    /// is accepted and left for the backend to judge.
    ///
    /// # Examples
    ///
    /// ```
    /// use common::MediaSource;
    ///
    /// let src = MediaSource::new("/videos/Movie.MKV").unwrap();
    /// assert_eq!(src.extension(), Some("mkv"));
    /// assert!(!src.is_network());
    ///
    /// let stream = MediaSource::new("rtsp://camera.local/live").unwrap();
    /// assert_eq!(stream.scheme(), Some("rtsp"));
    /// assert_eq!(stream.extension(), None);
    /// ```
    pub fn new(locator: impl Into<String>) -> Result<Self, PlayerError> {
        let locator = locator.into();
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(PlayerError::InvalidSource(
                "media locator is empty".to_string(),
            ));
        }

        let locator = trimmed.to_string();
        let scheme = parse_scheme(&locator);
        let extension = match scheme.as_deref() {
            Some(_) => uri_extension(&locator),
            None => path_extension(Path::new(&locator)),
        };

        Ok(Self {
            locator,
            scheme,
            extension,
        })
    }

    /// The locator exactly as given (trimmed).
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Lowercase URI scheme, if the locator is a URI.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Lowercase file extension, if one could be derived.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// True for anything that is reached over the network.
    pub fn is_network(&self) -> bool {
        matches!(self.scheme.as_deref(), Some(s) if s != "file")
    }

    /// True when the scheme is a streaming protocol rather than a
    /// file-like resource.
    pub fn is_stream_protocol(&self) -> bool {
        matches!(self.scheme.as_deref(), Some(s) if !FILE_LIKE_SCHEMES.contains(&s))
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.locator)
    }
}

/// Extract `scheme` from `scheme://...`. Scheme characters follow RFC 3986.
fn parse_scheme(locator: &str) -> Option<String> {
    let (scheme, _) = locator.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Extension of the last path segment, ignoring query and fragment.
fn uri_extension(locator: &str) -> Option<String> {
    let (_, rest) = locator.split_once("://")?;
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    // Drop the authority; a bare host has no path segment to inspect.
    let (_, path) = rest.split_once('/')?;
    let segment = path.rsplit('/').next().unwrap_or_default();
    path_extension(Path::new(segment))
}
