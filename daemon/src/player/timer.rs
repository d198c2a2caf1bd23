//! Cancellable background timers.
//!
//! A [`Ticker`] runs a callback on its own thread, either once after a delay
//! or repeatedly at a fixed interval. [`Ticker::stop`] returns only after the
//! thread has exited, so once it returns the callback can never run again.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct Ticker {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Run `tick` every `interval` until stopped. The first tick fires one
    /// interval after creation.
    pub fn repeating<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(name, move |stop_rx| {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    // Stop requested or ticker dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }

    /// Run `fire` once after `delay` unless stopped first.
    pub fn once<F>(name: &str, delay: Duration, fire: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(name, move |stop_rx| {
            if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(delay) {
                fire();
            }
        })
    }

    fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(mpsc::Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx))?;

        log::trace!("Ticker '{}' started", name);

        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the ticker and wait for its thread to exit. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender wakes the thread immediately
        self.stop_tx.take();

        if let Some(handle) = self.handle.take() {
            // A callback that stops its own ticker must not join itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::warn!("Ticker '{}' panicked", self.name);
            }
            log::trace!("Ticker '{}' stopped", self.name);
        }
    }

    #[allow(dead_code)] // Used by tests and debugging
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
