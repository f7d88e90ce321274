//! Per-identifier debounce timers.
//!
//! Each identifier is either idle (absent) or pending with a single fire
//! time. A new event while pending pushes the fire time out instead of
//! queueing a second notification.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use crate::uri::ResourceUri;

/// Default quiet period before a burst becomes one notification.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Armed {
    /// Idle → Pending.
    New,
    /// Pending → Pending with a later deadline.
    Reset,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<ResourceUri, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// (Re)start the timer for `uri` so it fires `window` after `now`.
    pub fn arm(&mut self, uri: &ResourceUri, now: Instant) -> Armed {
        match self.pending.insert(uri.clone(), now + self.window) {
            Some(_) => Armed::Reset,
            None => Armed::New,
        }
    }

    /// Drop any pending timer for `uri`. Returns whether one was live.
    pub fn cancel(&mut self, uri: &ResourceUri) -> bool {
        self.pending.remove(uri).is_some()
    }

    pub fn is_pending(&self, uri: &ResourceUri) -> bool {
        self.pending.contains_key(uri)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest fire time, if anything is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every identifier whose timer expired at `now`.
    /// Each is returned exactly once; the identifier goes back to idle.
    pub fn take_due(&mut self, now: Instant) -> Vec<ResourceUri> {
        let mut due: Vec<ResourceUri> = self
            .pending
            .iter()
            .filter(|(_, fire_at)| **fire_at <= now)
            .map(|(uri, _)| uri.clone())
            .collect();
        for uri in &due {
            self.pending.remove(uri);
        }
        due.sort();
        due
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
