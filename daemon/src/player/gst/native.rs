//! Push-based engine on `playbin`.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::super::engine::{
    NativeEngine, NativeStatus, ObserverToken, PositionObserver, StatusObserver,
};
use super::super::timer::Ticker;
use super::{make_playbin, shut_down, to_clock_time, to_duration, to_uri};

const BUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

type SharedStatus = Arc<Mutex<Option<StatusObserver>>>;

pub struct GstNative {
    playbin: gst::Element,
    status: SharedStatus,
    bus_watch: Option<Ticker>,
    periodic: Option<(ObserverToken, Ticker)>,
    next_token: u64,
    released: bool,
}

impl GstNative {
    pub fn new() -> Result<Self> {
        Ok(Self {
            playbin: make_playbin()?,
            status: Arc::new(Mutex::new(None)),
            bus_watch: None,
            periodic: None,
            next_token: 0,
            released: false,
        })
    }

    fn start_bus_watch(&mut self) -> Result<()> {
        let bus = self.playbin.bus().context("playbin has no bus")?;
        let playbin = self.playbin.clone();
        let status = self.status.clone();

        let watch = Ticker::repeating("wave-native-bus", BUS_POLL_INTERVAL, move || {
            while let Some(msg) = bus.pop() {
                let Some(report) = translate(&playbin, &msg) else {
                    continue;
                };
                if let Ok(mut observer) = status.lock() {
                    if let Some(observer) = observer.as_mut() {
                        observer(report);
                    }
                }
            }
        })
        .context("Failed to start bus watch")?;

        self.bus_watch = Some(watch);
        Ok(())
    }
}

/// Map a bus message to a status report, if it is one the observer cares
/// about.
fn translate(playbin: &gst::Element, msg: &gst::Message) -> Option<NativeStatus> {
    match msg.view() {
        gst::MessageView::AsyncDone(_) => Some(NativeStatus::ReadyToPlay {
            duration: playbin
                .query_duration::<gst::ClockTime>()
                .map(to_duration)
                .filter(|d| !d.is_zero()),
        }),
        gst::MessageView::Eos(_) => Some(NativeStatus::Ended),
        gst::MessageView::Error(err) => {
            log::error!(
                "GStreamer error: {} (debug: {:?})",
                err.error(),
                err.debug()
            );
            Some(NativeStatus::Failed(err.error().to_string()))
        }
        _ => None,
    }
}

impl NativeEngine for GstNative {
    fn open(&mut self, locator: &str) -> Result<()> {
        let uri = to_uri(locator)?;
        log::debug!("Opening {} on native engine", uri);

        self.playbin.set_property("uri", uri.as_str());
        self.start_bus_watch()?;

        // Preroll; AsyncDone on the bus means ready
        if let Ok(mut status) = self.status.lock() {
            if let Some(observer) = status.as_mut() {
                observer(NativeStatus::Preparing);
            }
        }
        self.playbin
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to Paused state")?;
        Ok(())
    }

    fn set_status_observer(&mut self, observer: Option<StatusObserver>) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *status = observer;
    }

    fn add_periodic_observer(
        &mut self,
        interval: Duration,
        mut observer: PositionObserver,
    ) -> Result<ObserverToken> {
        if let Some((_, mut previous)) = self.periodic.take() {
            previous.stop();
        }

        let playbin = self.playbin.clone();
        let ticker = Ticker::repeating("wave-native-time", interval, move || {
            if let Some(position) = playbin.query_position::<gst::ClockTime>() {
                observer(to_duration(position));
            }
        })
        .context("Failed to start time observer")?;

        self.next_token += 1;
        let token = ObserverToken(self.next_token);
        self.periodic = Some((token, ticker));
        Ok(token)
    }

    fn remove_periodic_observer(&mut self, token: ObserverToken) {
        if self.periodic.as_ref().is_some_and(|(t, _)| *t == token) {
            if let Some((_, mut ticker)) = self.periodic.take() {
                ticker.stop();
            }
        }
    }

    fn play(&mut self) -> Result<()> {
        self.playbin
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to Playing state")?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.playbin
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to Paused state")?;
        Ok(())
    }

    fn seek_precise(&mut self, position: Duration) -> Result<()> {
        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                to_clock_time(position),
            )
            .context("Failed to seek")
    }

    fn set_volume(&mut self, volume: f32) {
        self.playbin.set_property("volume", f64::from(volume));
    }

    fn volume(&self) -> f32 {
        self.playbin.property::<f64>("volume") as f32
    }

    fn position(&self) -> Option<Duration> {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(to_duration)
    }

    fn duration(&self) -> Option<Duration> {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(to_duration)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some((_, mut ticker)) = self.periodic.take() {
            ticker.stop();
        }
        if let Some(mut watch) = self.bus_watch.take() {
            watch.stop();
        }
        self.set_status_observer(None);
        shut_down(&self.playbin);
        log::debug!("Native engine released");
    }
}

impl Drop for GstNative {
    fn drop(&mut self) {
        self.release();
    }
}
