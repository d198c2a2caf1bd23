//! The playback coordinator.
//!
//! Owns at most one [`BackendAdapter`] at a time, picks the backend for each
//! load, and folds everything the adapters report into the single published
//! [`PlaybackState`]. All methods are synchronous; the actor in
//! [`super::service`] is the only caller in the daemon.
//!
//! # Load sequence
//!
//! 1. Stop the load timer and tear down the current adapter (observers and
//!    tickers joined, engine released).
//! 2. Start a new session and classify the source.
//! 3. Build the selected adapter through the [`EngineFactory`] and load it
//!    with the current volume.
//! 4. Publish `Loading` and arm the load timeout. The adapter later reports
//!    `Ready`, `Failed` or nothing at all (caught by the timeout).

use anyhow::{Context, Result};
use common::{
    BackendKind, EffectsPatch, MediaDuration, MediaSource, PlaybackState, PlayerPhase,
    VideoEffects, clamp_volume, classify,
};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc::UnboundedSender, watch};

use super::adapter::{AdapterEvent, BackendAdapter, EventSink, SessionEvent};
use super::engine::EngineFactory;
use super::native::NativeAdapter;
use super::publisher::StatePublisher;
use super::timer::Ticker;
use super::universal::UniversalAdapter;
use crate::config::PlaybackSettings;
use crate::log_and_continue;

/// Position samples further than this from a pending seek target are
/// treated as pre-seek leftovers.
const SEEK_TOLERANCE_SECS: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// How often adapters sample position
    pub tick_interval: Duration,
    /// Give up on a load that has not become ready after this long
    pub load_timeout: Option<Duration>,
    /// How long stale samples are ignored after a seek
    pub seek_settle: Duration,
    pub initial_volume: f32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            load_timeout: Some(Duration::from_secs(20)),
            seek_settle: Duration::from_secs(2),
            initial_volume: 1.0,
        }
    }
}

impl From<&PlaybackSettings> for CoordinatorSettings {
    fn from(playback: &PlaybackSettings) -> Self {
        Self {
            tick_interval: Duration::from_millis(playback.tick_interval_ms),
            load_timeout: (playback.load_timeout_secs > 0)
                .then_some(Duration::from_secs(playback.load_timeout_secs)),
            initial_volume: playback.initial_volume,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target: f64,
    issued: Instant,
}

pub struct Coordinator {
    factory: Box<dyn EngineFactory>,
    settings: CoordinatorSettings,
    publisher: StatePublisher,
    events: UnboundedSender<SessionEvent>,
    adapter: Option<Box<dyn BackendAdapter>>,
    load_timer: Option<Ticker>,
    session: u64,
    pending_seek: Option<PendingSeek>,
}

impl Coordinator {
    /// Create an idle coordinator. Adapter events must be fed back through
    /// [`Coordinator::handle_event`] from the receiving end of `events`.
    pub fn new(
        factory: Box<dyn EngineFactory>,
        settings: CoordinatorSettings,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let publisher = StatePublisher::new(PlaybackState::with_volume(settings.initial_volume));
        Self {
            factory,
            settings,
            publisher,
            events,
            adapter: None,
            load_timer: None,
            session: 0,
            pending_seek: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.publisher.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.publisher.snapshot()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    /// Replace whatever is loaded with `source`.
    pub fn load(&mut self, source: MediaSource) {
        self.release_adapter();
        self.session += 1;

        let kind = classify(&source);
        let volume = self.publisher.read(|s| s.volume);
        log::info!(
            "Loading {} with {} backend (session {})",
            source,
            kind,
            self.session
        );

        let outcome = match self.build_adapter(kind, &source, volume) {
            Ok(adapter) => {
                self.adapter = Some(adapter);
                self.arm_load_timeout();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load {}: {:#}", source, e);
                Err(format!("{:#}", e))
            }
        };

        self.publisher.update(|s| {
            s.source = Some(source);
            s.is_playing = false;
            s.current_time_secs = 0.0;
            s.pending_seek_secs = None;
            s.duration = MediaDuration::Unknown;
            match outcome {
                Ok(()) => {
                    s.backend_kind = Some(kind);
                    s.has_active_backend = true;
                    s.phase = PlayerPhase::Loading;
                }
                Err(reason) => {
                    s.backend_kind = None;
                    s.has_active_backend = false;
                    s.phase = PlayerPhase::Failed { reason };
                }
            }
        });
    }

    fn build_adapter(
        &self,
        kind: BackendKind,
        source: &MediaSource,
        volume: f32,
    ) -> Result<Box<dyn BackendAdapter>> {
        let sink = EventSink::new(self.session, self.events.clone());
        let interval = self.settings.tick_interval;

        let mut adapter: Box<dyn BackendAdapter> = match kind {
            BackendKind::Native => {
                let engine = self
                    .factory
                    .native()
                    .context("Failed to create native engine")?;
                Box::new(NativeAdapter::new(engine, sink, interval))
            }
            BackendKind::Universal => {
                let engine = self
                    .factory
                    .universal()
                    .context("Failed to create universal engine")?;
                Box::new(UniversalAdapter::new(engine, sink, interval))
            }
        };

        // A failed load drops the adapter here, which releases its engine
        adapter.load(source, volume)?;
        Ok(adapter)
    }

    fn arm_load_timeout(&mut self) {
        let Some(timeout) = self.settings.load_timeout else {
            return;
        };

        let sink = EventSink::new(self.session, self.events.clone());
        match Ticker::once("wave-load-timeout", timeout, move || {
            sink.emit(AdapterEvent::LoadTimeout);
        }) {
            Ok(timer) => self.load_timer = Some(timer),
            Err(e) => log::warn!("Load timeout unavailable for this load: {}", e),
        }
    }

    /// Stop the load timer and tear down the adapter, without publishing.
    fn release_adapter(&mut self) {
        if let Some(mut timer) = self.load_timer.take() {
            timer.stop();
        }
        if let Some(mut adapter) = self.adapter.take() {
            log::debug!(
                "Tearing down {} backend (session {})",
                adapter.kind(),
                self.session
            );
            adapter.teardown();
        }
        self.pending_seek = None;
    }

    pub fn play(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        log_and_continue!(adapter.play(), "start playback");
        self.publisher.update(|s| s.is_playing = true);
    }

    pub fn pause(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        log_and_continue!(adapter.pause(), "pause playback");
        self.publisher.update(|s| s.is_playing = false);
    }

    pub fn toggle_play_pause(&mut self) {
        if self.adapter.is_none() {
            return;
        }
        if self.publisher.read(|s| s.is_playing) {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek to `secs`. The published position jumps to the target right away
    /// and stays there until the backend confirms it.
    pub fn seek(&mut self, secs: f64) {
        if !secs.is_finite() {
            log::warn!("Ignoring seek to {}", secs);
            return;
        }
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };

        let target = secs.max(0.0);
        self.pending_seek = Some(PendingSeek {
            target,
            issued: Instant::now(),
        });
        self.publisher.update(|s| {
            s.current_time_secs = target;
            s.pending_seek_secs = Some(target);
        });

        log_and_continue!(adapter.seek(target), "seek");
    }

    /// Seek relative to the current (or pending) position, staying within
    /// the media.
    pub fn skip(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return;
        };

        let (position, duration) = self.publisher.read(|s| (s.current_time_secs, s.duration));
        let duration = match duration {
            MediaDuration::Unknown => adapter.duration(),
            known => known,
        };
        let base = self.pending_seek.map_or(position, |p| p.target);

        let mut target = (base + delta).max(0.0);
        if let Some(total) = duration.finite_secs() {
            target = target.min(total);
        }
        self.seek(target);
    }

    /// Record the volume and apply it to the active backend. Works without
    /// a backend; the next one starts at this volume.
    pub fn set_volume(&mut self, level: f32) {
        let volume = clamp_volume(level);
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_volume(volume);
            log::debug!(
                "Volume {:.2} applied (engine reports {:?})",
                volume,
                adapter.volume()
            );
        }
        self.publisher.update(|s| s.volume = volume);
    }

    pub fn set_effects(&mut self, patch: &EffectsPatch) {
        self.publisher.update(|s| s.effects.apply(patch));
    }

    pub fn reset_effects(&mut self) {
        self.publisher.update(|s| s.effects = VideoEffects::default());
    }

    /// Tear down the active backend and return to idle.
    pub fn close(&mut self) {
        self.release_adapter();
        self.session += 1;
        self.publisher.update(|s| {
            s.backend_kind = None;
            s.has_active_backend = false;
            s.phase = PlayerPhase::Idle;
            s.source = None;
            s.is_playing = false;
            s.current_time_secs = 0.0;
            s.pending_seek_secs = None;
            s.duration = MediaDuration::Unknown;
        });
    }

    /// Fold one adapter event into the published state.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if event.session != self.session || self.adapter.is_none() {
            log::trace!(
                "Dropping {:?} from session {} (current {})",
                event.event,
                event.session,
                self.session
            );
            return;
        }

        match event.event {
            AdapterEvent::Ready { duration } => {
                if let Some(mut timer) = self.load_timer.take() {
                    timer.stop();
                }
                log::info!("Backend ready (duration: {:?})", duration);
                self.publisher.update(|s| {
                    s.duration = duration;
                    if s.phase == PlayerPhase::Loading {
                        s.phase = PlayerPhase::Ready;
                    }
                });
            }

            AdapterEvent::Tick { position, duration } => {
                let accept = self.accept_sample(position);
                let pending = self.pending_seek.map(|p| p.target);
                self.publisher.update(|s| {
                    if let Some(duration) = duration {
                        s.duration = duration;
                    }
                    if accept {
                        s.current_time_secs = position;
                    }
                    s.pending_seek_secs = pending;
                });
            }

            AdapterEvent::Ended => {
                log::info!("Playback reached the end");
                // Hold the engine paused so a later seek does not resume it
                if let Some(adapter) = self.adapter.as_mut() {
                    log_and_continue!(adapter.pause(), "pause at end of media");
                }
                let position = self.adapter.as_ref().and_then(|a| a.current_time());
                self.publisher.update(|s| {
                    s.is_playing = false;
                    if let Some(position) = position {
                        s.current_time_secs = position;
                    }
                });
            }

            AdapterEvent::Failed(reason) => self.fail(reason),

            AdapterEvent::LoadTimeout => {
                self.load_timer = None;
                if self.publisher.read(|s| s.phase == PlayerPhase::Loading) {
                    let timeout = self.settings.load_timeout.unwrap_or_default();
                    self.fail(format!("backend did not become ready within {:?}", timeout));
                }
            }
        }
    }

    /// Decide whether a position sample should overwrite the published time
    /// while a seek is pending.
    fn accept_sample(&mut self, position: f64) -> bool {
        let Some(pending) = self.pending_seek else {
            return true;
        };

        let confirmed = (position - pending.target).abs() <= SEEK_TOLERANCE_SECS;
        let settled = pending.issued.elapsed() >= self.settings.seek_settle;
        if confirmed || settled {
            self.pending_seek = None;
            true
        } else {
            false
        }
    }

    fn fail(&mut self, reason: String) {
        log::error!("Playback failed: {}", reason);
        self.release_adapter();
        self.publisher.update(|s| {
            s.backend_kind = None;
            s.has_active_backend = false;
            s.is_playing = false;
            s.pending_seek_secs = None;
            s.phase = PlayerPhase::Failed { reason };
        });
    }

    /// Release everything before the process exits.
    pub fn shutdown(&mut self) {
        if self.has_adapter() {
            log::info!("Releasing playback backend");
        }
        self.close();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.release_adapter();
    }
}
