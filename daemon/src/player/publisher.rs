//! Single-writer publication of [`PlaybackState`].

use common::PlaybackState;
use tokio::sync::watch;

/// Owns the one writable copy of the playback state.
///
/// Each call to [`StatePublisher::update`] publishes exactly one snapshot to
/// every subscriber, whether or not anybody is listening.
pub struct StatePublisher {
    tx: watch::Sender<PlaybackState>,
}

impl StatePublisher {
    pub fn new(initial: PlaybackState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.tx.subscribe()
    }

    /// Clone of the latest published state.
    pub fn snapshot(&self) -> PlaybackState {
        self.tx.borrow().clone()
    }

    /// Read a field without cloning the whole record.
    pub fn read<T>(&self, f: impl FnOnce(&PlaybackState) -> T) -> T {
        f(&self.tx.borrow())
    }

    pub fn update(&self, f: impl FnOnce(&mut PlaybackState)) {
        self.tx.send_modify(f);
    }
}
