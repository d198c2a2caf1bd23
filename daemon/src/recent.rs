//! In-memory history of network streams opened through the daemon.

use common::MediaSource;
use std::collections::VecDeque;

/// Most-recent-first list of network locators, without duplicates.
#[derive(Debug)]
pub struct RecentStreams {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecentStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember `source` if it is a network stream. Re-opening a stream
    /// moves it to the front.
    pub fn record(&mut self, source: &MediaSource) {
        if !source.is_network() || self.capacity == 0 {
            return;
        }

        let locator = source.locator();
        if let Some(pos) = self.entries.iter().position(|e| e == locator) {
            self.entries.remove(pos);
        }
        self.entries.push_front(locator.to_string());
        self.entries.truncate(self.capacity);
    }

    pub fn list(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}
