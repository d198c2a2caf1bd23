//! GStreamer-backed engines.
//!
//! Both engine families are built on `playbin`. The native engine watches
//! the bus on a background [`Ticker`](super::timer::Ticker) and pushes to
//! observers; the universal engine only drains the bus when polled.

mod native;
mod universal;

use anyhow::{Context, Result};
use gstreamer as gst;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::engine::{EngineFactory, NativeEngine, UniversalEngine};

pub struct GstEngines;

impl EngineFactory for GstEngines {
    fn native(&self) -> Result<Box<dyn NativeEngine>> {
        init()?;
        Ok(Box::new(native::GstNative::new()?))
    }

    fn universal(&self) -> Result<Box<dyn UniversalEngine>> {
        init()?;
        Ok(Box::new(universal::GstUniversal::new()?))
    }
}

/// Initialize GStreamer once per process. A failed init is remembered so
/// every later load reports the same error.
fn init() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    INIT.get_or_init(|| match gst::init() {
        Ok(()) => {
            log::info!("GStreamer initialized");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    })
    .clone()
    .map_err(|e| anyhow::anyhow!("Failed to initialize GStreamer: {}", e))
}

fn make_playbin() -> Result<gst::Element> {
    gst::ElementFactory::make("playbin")
        .build()
        .context("Failed to create playbin (is gst-plugins-base installed?)")
}

/// Turn a locator into something `playbin` accepts: URIs pass through,
/// paths become `file://` URIs.
fn to_uri(locator: &str) -> Result<String> {
    if locator.contains("://") {
        return Ok(locator.to_string());
    }

    let path = Path::new(locator);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve working directory")?
            .join(path)
    };

    gst::glib::filename_to_uri(&absolute, None)
        .map(|uri| uri.to_string())
        .map_err(|e| anyhow::anyhow!("Invalid media path {}: {}", absolute.display(), e))
}

fn to_duration(time: gst::ClockTime) -> Duration {
    Duration::from_nanos(time.nseconds())
}

fn to_clock_time(duration: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
}

/// Stop `playbin` and drop whatever is left on its bus.
fn shut_down(playbin: &gst::Element) {
    use gstreamer::prelude::*;

    if let Err(e) = playbin.set_state(gst::State::Null) {
        log::warn!("Failed to set playbin state to Null: {}", e);
    }

    if let Some(bus) = playbin.bus() {
        let mut drained = 0;
        while bus.pop().is_some() {
            drained += 1;
        }
        if drained > 0 {
            log::debug!("Drained {} pending messages from bus", drained);
        }
    }
}
