//! Playback engine seams.
//!
//! The two engine families expose deliberately different surfaces, and the
//! adapters in [`super::native`] and [`super::universal`] normalize them:
//!
//! - [`NativeEngine`] pushes status changes and periodic positions to
//!   registered observers, takes float volume and seeks precisely.
//! - [`UniversalEngine`] is polled: callers read its state, time and length
//!   in milliseconds and set an integer 0-100 volume.

use anyhow::Result;
use std::time::Duration;

/// Status reported by a native engine to its status observer.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeStatus {
    Preparing,
    /// Media is ready; `None` duration means the engine could not determine
    /// one (live media).
    ReadyToPlay { duration: Option<Duration> },
    Failed(String),
    Ended,
}

pub type StatusObserver = Box<dyn FnMut(NativeStatus) + Send>;
pub type PositionObserver = Box<dyn FnMut(Duration) + Send>;

/// Handle for a registered periodic observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

pub trait NativeEngine: Send {
    /// Open a media locator. Preparation continues asynchronously and is
    /// reported to the status observer.
    fn open(&mut self, locator: &str) -> Result<()>;

    /// Install or clear the status observer.
    fn set_status_observer(&mut self, observer: Option<StatusObserver>);

    /// Call `observer` with the playback position every `interval`.
    fn add_periodic_observer(
        &mut self,
        interval: Duration,
        observer: PositionObserver,
    ) -> Result<ObserverToken>;

    /// Unregister a periodic observer. Once this returns the observer will
    /// not be called again.
    fn remove_periodic_observer(&mut self, token: ObserverToken);

    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;

    /// Seek with zero tolerance before and after the target.
    fn seek_precise(&mut self, position: Duration) -> Result<()>;

    /// Volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;

    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;

    /// Release every engine resource. Further calls are no-ops.
    fn release(&mut self);
}

/// Coarse state of a universal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

pub trait UniversalEngine: Send {
    /// Bind a media locator without starting playback.
    fn set_media(&mut self, locator: &str) -> Result<()>;

    /// Start asynchronous metadata parsing; the length shows up in
    /// [`UniversalEngine::length_ms`] once known.
    fn parse_media(&mut self) -> Result<()>;

    /// Start playback. From `Ended` this restarts at the beginning.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn stop(&mut self);

    /// Current engine state. Takes `&mut self` so implementations can drain
    /// pending engine messages while polling.
    fn state(&mut self) -> EngineState;

    /// Description of the last error, if the engine is in `Error` state.
    fn last_error(&self) -> Option<String> {
        None
    }

    /// Playback position in milliseconds.
    fn time_ms(&self) -> i64;

    /// Media length in milliseconds, `<= 0` when unknown or unbounded.
    fn length_ms(&self) -> i64;

    /// Jump to `ms`. Seeking out of `Ended` leaves the engine `Paused` at
    /// the target.
    fn set_time_ms(&mut self, ms: i64);

    /// Volume in `0..=100`.
    fn volume(&self) -> i32;
    fn set_volume(&mut self, volume: i32);

    /// Release every engine resource. Further calls are no-ops.
    fn release(&mut self);
}

/// Constructs engines for the coordinator, one per load.
pub trait EngineFactory: Send {
    fn native(&self) -> Result<Box<dyn NativeEngine>>;
    fn universal(&self) -> Result<Box<dyn UniversalEngine>>;
}

/// Factory used when the daemon is built without playback support.
#[cfg_attr(feature = "video", allow(dead_code))]
pub struct UnavailableEngines;

impl EngineFactory for UnavailableEngines {
    fn native(&self) -> Result<Box<dyn NativeEngine>> {
        anyhow::bail!("playback support not compiled in")
    }

    fn universal(&self) -> Result<Box<dyn UniversalEngine>> {
        anyhow::bail!("playback support not compiled in")
    }
}

/// The engine factory for this build.
pub fn default_factory() -> Box<dyn EngineFactory> {
    #[cfg(feature = "video")]
    {
        Box::new(super::gst::GstEngines)
    }

    #[cfg(not(feature = "video"))]
    {
        Box::new(UnavailableEngines)
    }
}
