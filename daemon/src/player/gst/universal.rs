//! Polled engine on `playbin`.
//!
//! Nothing runs in the background: bus messages pile up until the next
//! [`UniversalEngine::state`] call drains them.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;

use super::super::engine::{EngineState, UniversalEngine};
use super::{make_playbin, shut_down, to_uri};

pub struct GstUniversal {
    playbin: gst::Element,
    state: EngineState,
    error: Option<String>,
    released: bool,
}

impl GstUniversal {
    pub fn new() -> Result<Self> {
        Ok(Self {
            playbin: make_playbin()?,
            state: EngineState::Opening,
            error: None,
            released: false,
        })
    }

    fn drain_bus(&mut self) {
        let Some(bus) = self.playbin.bus() else {
            return;
        };

        while let Some(msg) = bus.pop() {
            let signal = match msg.view() {
                gst::MessageView::Eos(_) => BusSignal::Eos,
                gst::MessageView::Error(err) => {
                    log::error!(
                        "GStreamer error: {} (debug: {:?})",
                        err.error(),
                        err.debug()
                    );
                    self.error = Some(err.error().to_string());
                    BusSignal::Error
                }
                gst::MessageView::Buffering(b) => BusSignal::Buffering {
                    percent: b.percent(),
                    // Finished rebuffering posts no StateChanged, so the
                    // pipeline's own state is what playback resumes in
                    pipeline: self.playbin.current_state(),
                },
                gst::MessageView::StateChanged(sc)
                    if msg.src() == Some(self.playbin.upcast_ref::<gst::Object>()) =>
                {
                    BusSignal::StateChanged(sc.current())
                }
                _ => continue,
            };
            self.state = next_state(self.state, signal);
        }
    }
}

/// The bus messages the engine state follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusSignal {
    Eos,
    Error,
    Buffering { percent: i32, pipeline: gst::State },
    StateChanged(gst::State),
}

/// Fold one bus message into the engine state. `Error` and `Ended` stick
/// until the engine itself moves out of them.
fn next_state(current: EngineState, signal: BusSignal) -> EngineState {
    match (current, signal) {
        (EngineState::Error, _) => EngineState::Error,
        (_, BusSignal::Error) => EngineState::Error,
        (_, BusSignal::Eos) => EngineState::Ended,
        (EngineState::Ended, _) => EngineState::Ended,
        (_, BusSignal::Buffering { percent, .. }) if percent < 100 => EngineState::Buffering,
        (_, BusSignal::Buffering { pipeline, .. }) => match pipeline {
            gst::State::Playing => EngineState::Playing,
            gst::State::Paused => EngineState::Paused,
            _ if current == EngineState::Buffering => EngineState::Stopped,
            _ => current,
        },
        // A prerolled pipeline counts as paused even if the length is unknown
        (_, BusSignal::StateChanged(gst::State::Playing)) => EngineState::Playing,
        (_, BusSignal::StateChanged(gst::State::Paused)) => EngineState::Paused,
        (_, BusSignal::StateChanged(_)) => EngineState::Stopped,
    }
}

impl UniversalEngine for GstUniversal {
    fn set_media(&mut self, locator: &str) -> Result<()> {
        let uri = to_uri(locator)?;
        log::debug!("Opening {} on universal engine", uri);
        self.playbin.set_property("uri", uri.as_str());
        self.state = EngineState::Opening;
        Ok(())
    }

    fn parse_media(&mut self) -> Result<()> {
        // Prerolling makes the length queryable
        self.playbin
            .set_state(gst::State::Paused)
            .context("Failed to preroll media")?;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.state == EngineState::Ended {
            self.set_time_ms(0);
        }
        self.playbin
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to Playing state")?;
        if self.state != EngineState::Error {
            self.state = EngineState::Playing;
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(e) = self.playbin.set_state(gst::State::Paused) {
            log::warn!("Failed to pause: {}", e);
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.playbin.set_state(gst::State::Ready) {
            log::warn!("Failed to stop: {}", e);
        }
        self.state = EngineState::Stopped;
    }

    fn state(&mut self) -> EngineState {
        self.drain_bus();
        self.state
    }

    fn last_error(&self) -> Option<String> {
        self.error.clone()
    }

    fn time_ms(&self) -> i64 {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map_or(0, |t| i64::try_from(t.mseconds()).unwrap_or(i64::MAX))
    }

    fn length_ms(&self) -> i64 {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map_or(-1, |t| i64::try_from(t.mseconds()).unwrap_or(i64::MAX))
    }

    fn set_time_ms(&mut self, ms: i64) {
        let target = gst::ClockTime::from_mseconds(u64::try_from(ms).unwrap_or(0));
        if let Err(e) = self
            .playbin
            .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT, target)
        {
            log::warn!("Seek to {}ms failed: {}", ms, e);
            return;
        }
        // Leaving the end keeps the target; the next play must not rewind
        if self.state == EngineState::Ended {
            self.state = EngineState::Paused;
        }
    }

    fn volume(&self) -> i32 {
        (self.playbin.property::<f64>("volume") * 100.0).round() as i32
    }

    fn set_volume(&mut self, volume: i32) {
        self.playbin
            .set_property("volume", f64::from(volume.clamp(0, 100)) / 100.0);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        shut_down(&self.playbin);
        log::debug!("Universal engine released");
    }
}

impl Drop for GstUniversal {
    fn drop(&mut self) {
        self.release();
    }
}
