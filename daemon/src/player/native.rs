//! Adapter for the push-based native engine.

use anyhow::{Context, Result};
use common::{BackendKind, MediaDuration, MediaSource};
use std::time::Duration;

use super::adapter::{AdapterEvent, BackendAdapter, EventSink};
use super::engine::{NativeEngine, NativeStatus, ObserverToken};

pub struct NativeAdapter {
    engine: Option<Box<dyn NativeEngine>>,
    sink: EventSink,
    tick_interval: Duration,
    observer: Option<ObserverToken>,
}

impl NativeAdapter {
    pub fn new(engine: Box<dyn NativeEngine>, sink: EventSink, tick_interval: Duration) -> Self {
        Self {
            engine: Some(engine),
            sink,
            tick_interval,
            observer: None,
        }
    }

    fn engine(&mut self) -> Result<&mut Box<dyn NativeEngine>> {
        self.engine.as_mut().context("native engine already released")
    }
}

impl BackendAdapter for NativeAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn load(&mut self, source: &MediaSource, volume: f32) -> Result<()> {
        let status_sink = self.sink.clone();
        let mut ready = false;
        let tick_sink = self.sink.clone();
        let interval = self.tick_interval;

        let engine = self.engine()?;

        // Only the first ready transition counts; later ones (e.g. after a
        // seek) carry no new information.
        engine.set_status_observer(Some(Box::new(move |status| match status {
            NativeStatus::ReadyToPlay { duration } if !ready => {
                ready = true;
                let duration = duration
                    .map(|d| MediaDuration::from_secs(d.as_secs_f64()))
                    .unwrap_or(MediaDuration::Indefinite);
                status_sink.emit(AdapterEvent::Ready { duration });
            }
            NativeStatus::Failed(reason) => {
                status_sink.emit(AdapterEvent::Failed(reason));
            }
            NativeStatus::Ended => {
                status_sink.emit(AdapterEvent::Ended);
            }
            NativeStatus::ReadyToPlay { .. } | NativeStatus::Preparing => {}
        })));

        engine
            .open(source.locator())
            .with_context(|| format!("Failed to open {}", source))?;
        engine.set_volume(volume);

        let token = engine
            .add_periodic_observer(
                interval,
                Box::new(move |position| {
                    tick_sink.emit(AdapterEvent::Tick {
                        position: position.as_secs_f64(),
                        duration: None,
                    });
                }),
            )
            .context("Failed to register time observer")?;
        self.observer = Some(token);

        log::debug!(
            "Native adapter loaded {} (session {})",
            source,
            self.sink.session()
        );
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.engine()?.play()
    }

    fn pause(&mut self) -> Result<()> {
        self.engine()?.pause()
    }

    fn seek(&mut self, secs: f64) -> Result<()> {
        let target = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or_default();
        self.engine()?.seek_precise(target)
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.set_volume(volume);
        }
    }

    fn volume(&self) -> Option<f32> {
        self.engine.as_ref().map(|e| e.volume())
    }

    fn current_time(&self) -> Option<f64> {
        let engine = self.engine.as_ref()?;
        engine.position().map(|p| p.as_secs_f64())
    }

    fn duration(&self) -> MediaDuration {
        self.engine
            .as_ref()
            .and_then(|e| e.duration())
            .map(|d| MediaDuration::from_secs(d.as_secs_f64()))
            .unwrap_or_default()
    }

    fn teardown(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };

        if let Some(token) = self.observer.take() {
            engine.remove_periodic_observer(token);
        }
        if let Err(e) = engine.pause() {
            log::debug!("Pause during teardown failed: {:#}", e);
        }
        engine.set_status_observer(None);
        engine.release();

        log::debug!("Native adapter released (session {})", self.sink.session());
    }
}

impl Drop for NativeAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}
