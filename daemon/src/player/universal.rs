//! Adapter for the polled universal engine.
//!
//! The engine pushes nothing, so the adapter runs its own [`Ticker`] that
//! samples the engine and turns what it sees into [`AdapterEvent`]s.

use anyhow::{Context, Result};
use common::{BackendKind, MediaDuration, MediaSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::adapter::{AdapterEvent, BackendAdapter, EventSink};
use super::engine::{EngineState, UniversalEngine};
use super::timer::Ticker;

type SharedEngine = Arc<Mutex<Box<dyn UniversalEngine>>>;

/// Float volume (`0.0..=1.0`) to the engine's integer scale.
pub fn volume_to_engine(volume: f32) -> i32 {
    if volume.is_nan() {
        return 0;
    }
    ((volume * 100.0).round() as i32).clamp(0, 100)
}

/// Engine integer volume back to `0.0..=1.0`.
pub fn volume_from_engine(volume: i32) -> f32 {
    volume.clamp(0, 100) as f32 / 100.0
}

/// Seconds to engine milliseconds, truncating; negative targets clamp to 0.
pub fn secs_to_ms(secs: f64) -> i64 {
    if secs.is_nan() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0) as i64
}

pub fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// What the poller remembers between ticks.
#[derive(Debug, Default)]
struct PollState {
    ready: bool,
    ended: bool,
    failed: bool,
}

pub struct UniversalAdapter {
    engine: Option<SharedEngine>,
    sink: EventSink,
    tick_interval: Duration,
    poller: Option<Ticker>,
}

impl UniversalAdapter {
    pub fn new(
        engine: Box<dyn UniversalEngine>,
        sink: EventSink,
        tick_interval: Duration,
    ) -> Self {
        Self {
            engine: Some(Arc::new(Mutex::new(engine))),
            sink,
            tick_interval,
            poller: None,
        }
    }

    fn with_engine<T>(&self, f: impl FnOnce(&mut Box<dyn UniversalEngine>) -> T) -> Result<T> {
        let engine = self
            .engine
            .as_ref()
            .context("universal engine already released")?;
        let mut guard = engine
            .lock()
            .map_err(|_| anyhow::anyhow!("universal engine lock poisoned"))?;
        Ok(f(&mut *guard))
    }
}

/// One poll of the engine.
fn poll(engine: &mut dyn UniversalEngine, poll_state: &mut PollState, sink: &EventSink) {
    if poll_state.failed {
        return;
    }

    let state = engine.state();
    let length = engine.length_ms();

    match state {
        EngineState::Error => {
            poll_state.failed = true;
            let reason = engine
                .last_error()
                .unwrap_or_else(|| "universal engine reported an error".to_string());
            sink.emit(AdapterEvent::Failed(reason));
            return;
        }
        EngineState::Ended => {
            if !poll_state.ended {
                poll_state.ended = true;
                sink.emit(AdapterEvent::Ended);
            }
            return;
        }
        _ => poll_state.ended = false,
    }

    if !poll_state.ready {
        // Parsing may finish before playback starts. An engine that is
        // playing or prerolled without a length is live media.
        if length > 0 {
            poll_state.ready = true;
            sink.emit(AdapterEvent::Ready {
                duration: MediaDuration::from_secs(ms_to_secs(length)),
            });
        } else if matches!(state, EngineState::Playing | EngineState::Paused) {
            poll_state.ready = true;
            sink.emit(AdapterEvent::Ready {
                duration: MediaDuration::Indefinite,
            });
        }
    }

    if state == EngineState::Playing {
        let duration = if length > 0 {
            MediaDuration::from_secs(ms_to_secs(length))
        } else {
            MediaDuration::Indefinite
        };
        sink.emit(AdapterEvent::Tick {
            position: ms_to_secs(engine.time_ms().max(0)),
            duration: Some(duration),
        });
    }
}

impl BackendAdapter for UniversalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Universal
    }

    fn load(&mut self, source: &MediaSource, volume: f32) -> Result<()> {
        self.with_engine(|engine| -> Result<()> {
            engine
                .set_media(source.locator())
                .with_context(|| format!("Failed to open {}", source))?;
            engine.set_volume(volume_to_engine(volume));
            engine.parse_media().context("Failed to start media parsing")?;
            Ok(())
        })??;

        let engine = self
            .engine
            .clone()
            .context("universal engine already released")?;
        let sink = self.sink.clone();
        let mut poll_state = PollState::default();

        let poller = Ticker::repeating("wave-universal-poll", self.tick_interval, move || {
            if let Ok(mut engine) = engine.lock() {
                poll(&mut **engine, &mut poll_state, &sink);
            }
        })
        .context("Failed to start universal engine poller")?;
        self.poller = Some(poller);

        log::debug!(
            "Universal adapter loaded {} (session {})",
            source,
            self.sink.session()
        );
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.with_engine(|engine| engine.play())?
    }

    fn pause(&mut self) -> Result<()> {
        self.with_engine(|engine| engine.pause())
    }

    fn seek(&mut self, secs: f64) -> Result<()> {
        self.with_engine(|engine| engine.set_time_ms(secs_to_ms(secs)))
    }

    fn set_volume(&mut self, volume: f32) {
        let level = volume_to_engine(volume);
        if let Err(e) = self.with_engine(|engine| engine.set_volume(level)) {
            log::debug!("Volume not applied: {:#}", e);
        }
    }

    fn volume(&self) -> Option<f32> {
        self.with_engine(|engine| volume_from_engine(engine.volume()))
            .ok()
    }

    fn current_time(&self) -> Option<f64> {
        self.with_engine(|engine| ms_to_secs(engine.time_ms().max(0)))
            .ok()
    }

    fn duration(&self) -> MediaDuration {
        match self.with_engine(|engine| engine.length_ms()) {
            Ok(length) if length > 0 => MediaDuration::from_secs(ms_to_secs(length)),
            _ => MediaDuration::Unknown,
        }
    }

    fn teardown(&mut self) {
        // Join the poller before touching the engine so no poll can race
        // the release.
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }

        let Some(engine) = self.engine.take() else {
            return;
        };
        if let Ok(mut engine) = engine.lock() {
            engine.stop();
            engine.release();
        }

        log::debug!(
            "Universal adapter released (session {})",
            self.sink.session()
        );
    }
}

impl Drop for UniversalAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}
