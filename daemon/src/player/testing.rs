//! Instrumented fake engines for player tests.
//!
//! Every fake writes what happened to it into a shared [`Probe`] so tests can
//! assert on ordering ("released before the next engine was created") and on
//! how many engines are alive at once. Tests drive the fakes through the
//! `*Control` handles returned by [`FakeEngines`].

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::engine::{
    EngineFactory, EngineState, NativeEngine, NativeStatus, ObserverToken, PositionObserver,
    StatusObserver, UniversalEngine,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct ProbeLog {
    entries: Vec<String>,
    live: usize,
    max_live: usize,
}

/// Ordered log of engine activity plus a live-engine counter.
#[derive(Clone, Default)]
pub struct Probe {
    inner: Arc<Mutex<ProbeLog>>,
}

impl Probe {
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.inner).entries.push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.inner).entries.clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.index_of(entry).is_some()
    }

    pub fn index_of(&self, entry: &str) -> Option<usize> {
        lock(&self.inner).entries.iter().position(|e| e == entry)
    }

    pub fn live(&self) -> usize {
        lock(&self.inner).live
    }

    pub fn max_live(&self) -> usize {
        lock(&self.inner).max_live
    }

    fn created(&self, name: &str) {
        let mut log = lock(&self.inner);
        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        log.entries.push(format!("{} created", name));
    }

    fn released(&self, name: &str) {
        let mut log = lock(&self.inner);
        log.live = log.live.saturating_sub(1);
        log.entries.push(format!("{} release", name));
    }
}

#[derive(Default)]
struct NativeShared {
    status: Option<StatusObserver>,
    periodic: Option<(ObserverToken, PositionObserver)>,
    next_token: u64,
    locator: Option<String>,
    volume: f32,
    position: Duration,
    duration: Option<Duration>,
    playing: bool,
    released: bool,
    fired: usize,
}

/// Test-side handle to one fake native engine.
#[derive(Clone)]
pub struct NativeControl {
    shared: Arc<Mutex<NativeShared>>,
}

impl NativeControl {
    fn notify(&self, status: NativeStatus) {
        let mut shared = lock(&self.shared);
        if let Some(observer) = shared.status.as_mut() {
            observer(status);
        }
    }

    pub fn ready(&self, duration: Option<Duration>) {
        lock(&self.shared).duration = duration;
        self.notify(NativeStatus::ReadyToPlay { duration });
    }

    pub fn fail(&self, reason: &str) {
        self.notify(NativeStatus::Failed(reason.to_string()));
    }

    pub fn end(&self) {
        self.notify(NativeStatus::Ended);
    }

    /// Fire the periodic observer, if one is registered.
    pub fn tick(&self, position: Duration) {
        let mut shared = lock(&self.shared);
        shared.position = position;
        if let Some((_, observer)) = shared.periodic.as_mut() {
            observer(position);
            shared.fired += 1;
        }
    }

    /// How many times the periodic observer has actually run.
    pub fn observer_fires(&self) -> usize {
        lock(&self.shared).fired
    }

    pub fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    pub fn position(&self) -> Duration {
        lock(&self.shared).position
    }

    pub fn locator(&self) -> Option<String> {
        lock(&self.shared).locator.clone()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared).playing
    }

    pub fn has_observers(&self) -> bool {
        let shared = lock(&self.shared);
        shared.status.is_some() || shared.periodic.is_some()
    }

    pub fn is_released(&self) -> bool {
        lock(&self.shared).released
    }
}

struct FakeNative {
    name: String,
    control: NativeControl,
    probe: Probe,
    fail_open: bool,
}

impl NativeEngine for FakeNative {
    fn open(&mut self, locator: &str) -> Result<()> {
        self.probe.record(format!("{} open", self.name));
        if self.fail_open {
            anyhow::bail!("cannot open {}", locator);
        }
        lock(&self.control.shared).locator = Some(locator.to_string());
        Ok(())
    }

    fn set_status_observer(&mut self, observer: Option<StatusObserver>) {
        if observer.is_none() {
            self.probe.record(format!("{} clear_status", self.name));
        }
        lock(&self.control.shared).status = observer;
    }

    fn add_periodic_observer(
        &mut self,
        _interval: Duration,
        observer: PositionObserver,
    ) -> Result<ObserverToken> {
        self.probe.record(format!("{} add_observer", self.name));
        let mut shared = lock(&self.control.shared);
        shared.next_token += 1;
        let token = ObserverToken(shared.next_token);
        shared.periodic = Some((token, observer));
        Ok(token)
    }

    fn remove_periodic_observer(&mut self, token: ObserverToken) {
        self.probe.record(format!("{} remove_observer", self.name));
        let mut shared = lock(&self.control.shared);
        if shared.periodic.as_ref().is_some_and(|(t, _)| *t == token) {
            shared.periodic = None;
        }
    }

    fn play(&mut self) -> Result<()> {
        self.probe.record(format!("{} play", self.name));
        lock(&self.control.shared).playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.probe.record(format!("{} pause", self.name));
        lock(&self.control.shared).playing = false;
        Ok(())
    }

    fn seek_precise(&mut self, position: Duration) -> Result<()> {
        self.probe
            .record(format!("{} seek {:.3}", self.name, position.as_secs_f64()));
        lock(&self.control.shared).position = position;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.probe.record(format!("{} volume {:.2}", self.name, volume));
        lock(&self.control.shared).volume = volume;
    }

    fn volume(&self) -> f32 {
        self.control.volume()
    }

    fn position(&self) -> Option<Duration> {
        Some(self.control.position())
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.control.shared).duration
    }

    fn release(&mut self) {
        let mut shared = lock(&self.control.shared);
        if !shared.released {
            shared.released = true;
            shared.playing = false;
            self.probe.released(&self.name);
        }
    }
}

struct UniversalShared {
    state: EngineState,
    error: Option<String>,
    locator: Option<String>,
    parsed: bool,
    time_ms: i64,
    length_ms: i64,
    volume: i32,
    released: bool,
}

impl Default for UniversalShared {
    fn default() -> Self {
        Self {
            state: EngineState::Opening,
            error: None,
            locator: None,
            parsed: false,
            time_ms: 0,
            length_ms: 0,
            volume: 100,
            released: false,
        }
    }
}

/// Test-side handle to one fake universal engine.
#[derive(Clone)]
pub struct UniversalControl {
    shared: Arc<Mutex<UniversalShared>>,
}

impl UniversalControl {
    pub fn set_state(&self, state: EngineState) {
        lock(&self.shared).state = state;
    }

    pub fn set_length_ms(&self, length_ms: i64) {
        lock(&self.shared).length_ms = length_ms;
    }

    pub fn set_time_ms(&self, time_ms: i64) {
        lock(&self.shared).time_ms = time_ms;
    }

    pub fn fail(&self, reason: &str) {
        let mut shared = lock(&self.shared);
        shared.state = EngineState::Error;
        shared.error = Some(reason.to_string());
    }

    pub fn state(&self) -> EngineState {
        lock(&self.shared).state
    }

    pub fn time_ms(&self) -> i64 {
        lock(&self.shared).time_ms
    }

    pub fn volume(&self) -> i32 {
        lock(&self.shared).volume
    }

    pub fn locator(&self) -> Option<String> {
        lock(&self.shared).locator.clone()
    }

    pub fn was_parsed(&self) -> bool {
        lock(&self.shared).parsed
    }

    pub fn is_released(&self) -> bool {
        lock(&self.shared).released
    }
}

struct FakeUniversal {
    name: String,
    control: UniversalControl,
    probe: Probe,
    fail_open: bool,
}

impl UniversalEngine for FakeUniversal {
    fn set_media(&mut self, locator: &str) -> Result<()> {
        self.probe.record(format!("{} set_media", self.name));
        if self.fail_open {
            anyhow::bail!("cannot open {}", locator);
        }
        lock(&self.control.shared).locator = Some(locator.to_string());
        Ok(())
    }

    fn parse_media(&mut self) -> Result<()> {
        lock(&self.control.shared).parsed = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.probe.record(format!("{} play", self.name));
        let mut shared = lock(&self.control.shared);
        if shared.state == EngineState::Ended {
            shared.time_ms = 0;
        }
        shared.state = EngineState::Playing;
        Ok(())
    }

    fn pause(&mut self) {
        self.probe.record(format!("{} pause", self.name));
        let mut shared = lock(&self.control.shared);
        if shared.state != EngineState::Ended {
            shared.state = EngineState::Paused;
        }
    }

    fn stop(&mut self) {
        self.probe.record(format!("{} stop", self.name));
        lock(&self.control.shared).state = EngineState::Stopped;
    }

    fn state(&mut self) -> EngineState {
        self.control.state()
    }

    fn last_error(&self) -> Option<String> {
        lock(&self.control.shared).error.clone()
    }

    fn time_ms(&self) -> i64 {
        self.control.time_ms()
    }

    fn length_ms(&self) -> i64 {
        lock(&self.control.shared).length_ms
    }

    fn set_time_ms(&mut self, ms: i64) {
        self.probe.record(format!("{} set_time {}", self.name, ms));
        let mut shared = lock(&self.control.shared);
        shared.time_ms = ms;
        if shared.state == EngineState::Ended {
            shared.state = EngineState::Paused;
        }
    }

    fn volume(&self) -> i32 {
        self.control.volume()
    }

    fn set_volume(&mut self, volume: i32) {
        self.probe.record(format!("{} volume {}", self.name, volume));
        lock(&self.control.shared).volume = volume;
    }

    fn release(&mut self) {
        let mut shared = lock(&self.control.shared);
        if !shared.released {
            shared.released = true;
            self.probe.released(&self.name);
        }
    }
}

/// Engine factory handing out instrumented fakes.
#[derive(Clone, Default)]
pub struct FakeEngines {
    probe: Probe,
    natives: Arc<Mutex<Vec<NativeControl>>>,
    universals: Arc<Mutex<Vec<UniversalControl>>>,
    refuse: Arc<AtomicBool>,
    fail_open: Arc<AtomicBool>,
}

impl FakeEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    /// Control for the `index`-th native engine created (0-based).
    pub fn native(&self, index: usize) -> NativeControl {
        lock(&self.natives)[index].clone()
    }

    /// Control for the `index`-th universal engine created (0-based).
    pub fn universal(&self, index: usize) -> UniversalControl {
        lock(&self.universals)[index].clone()
    }

    pub fn native_count(&self) -> usize {
        lock(&self.natives).len()
    }

    pub fn universal_count(&self) -> usize {
        lock(&self.universals).len()
    }

    /// Make the factory refuse to construct engines.
    pub fn refuse_construction(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make newly created engines fail to open media.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }
}

impl EngineFactory for FakeEngines {
    fn native(&self) -> Result<Box<dyn NativeEngine>> {
        if self.refuse.load(Ordering::SeqCst) {
            anyhow::bail!("engine unavailable");
        }
        let mut natives = lock(&self.natives);
        let name = format!("native#{}", natives.len() + 1);
        let control = NativeControl {
            shared: Arc::new(Mutex::new(NativeShared {
                volume: 1.0,
                ..Default::default()
            })),
        };
        natives.push(control.clone());
        self.probe.created(&name);

        Ok(Box::new(FakeNative {
            name,
            control,
            probe: self.probe.clone(),
            fail_open: self.fail_open.load(Ordering::SeqCst),
        }))
    }

    fn universal(&self) -> Result<Box<dyn UniversalEngine>> {
        if self.refuse.load(Ordering::SeqCst) {
            anyhow::bail!("engine unavailable");
        }
        let mut universals = lock(&self.universals);
        let name = format!("universal#{}", universals.len() + 1);
        let control = UniversalControl {
            shared: Arc::new(Mutex::new(UniversalShared::default())),
        };
        universals.push(control.clone());
        self.probe.created(&name);

        Ok(Box::new(FakeUniversal {
            name,
            control,
            probe: self.probe.clone(),
            fail_open: self.fail_open.load(Ordering::SeqCst),
        }))
    }
}
