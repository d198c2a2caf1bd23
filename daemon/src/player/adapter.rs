//! The uniform backend surface the coordinator drives.

use anyhow::Result;
use common::{BackendKind, MediaDuration, MediaSource};
use tokio::sync::mpsc::UnboundedSender;

/// Something an adapter observed about its engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Periodic position sample. `duration` is set when the sample also
    /// carries a (possibly updated) length.
    Tick {
        position: f64,
        duration: Option<MediaDuration>,
    },
    /// The engine finished preparing the media.
    Ready { duration: MediaDuration },
    /// The engine reported an error; the load is unusable.
    Failed(String),
    /// Playback reached the end of the media.
    Ended,
    /// The engine did not become ready in time.
    LoadTimeout,
}

/// An [`AdapterEvent`] tagged with the load session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: u64,
    pub event: AdapterEvent,
}

/// Where adapters and their timers report events.
///
/// Every sink is bound to one load session so the coordinator can drop
/// events from adapters that have since been replaced.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(session: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Send an event; returns false once the coordinator is gone.
    pub fn emit(&self, event: AdapterEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// One playback backend wrapped behind a common operation set.
///
/// Adapters are constructed per load and torn down before the next adapter
/// is built. All positions are in seconds and volume is `0.0..=1.0`.
pub trait BackendAdapter: Send {
    fn kind(&self) -> BackendKind;

    /// Open `source` on the engine and start reporting events. Preparation
    /// finishes asynchronously with [`AdapterEvent::Ready`].
    fn load(&mut self, source: &MediaSource, volume: f32) -> Result<()>;

    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, secs: f64) -> Result<()>;
    fn set_volume(&mut self, volume: f32);

    /// Volume as the engine currently reports it.
    fn volume(&self) -> Option<f32>;

    /// Position read straight from the engine.
    fn current_time(&self) -> Option<f64>;
    fn duration(&self) -> MediaDuration;

    /// Stop every timer and observer, then release the engine. Safe to call
    /// more than once and on an adapter that never loaded.
    fn teardown(&mut self);
}
