//! Reference-counted watcher ownership: one backend watcher per distinct path.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::{debug, error};

use crate::error::{Error, Result};

/// Opaque token for a live backend watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

/// A change observed by a backend watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Path the reporting watcher was registered for.
    pub watched: PathBuf,
    /// Path that actually changed (equal to, or below, `watched`).
    pub changed: PathBuf,
    /// The watcher for `watched` stopped working because the watched
    /// directory itself was removed or replaced.
    pub watch_lost: bool,
}

impl RawEvent {
    pub fn changed(watched: impl Into<PathBuf>, changed: impl Into<PathBuf>) -> Self {
        Self {
            watched: watched.into(),
            changed: changed.into(),
            watch_lost: false,
        }
    }

    pub fn lost(watched: impl Into<PathBuf>) -> Self {
        let watched = watched.into();
        Self {
            changed: watched.clone(),
            watched,
            watch_lost: true,
        }
    }
}

/// Capability to start and stop OS-level watchers.
///
/// Implementations must not emit an event for files that merely exist when
/// watching starts, and should only report a write once it has settled.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> Result<WatchHandle>;

    /// Stop the watcher synchronously. No events for `handle` may follow.
    fn unwatch(&mut self, handle: WatchHandle);
}

#[derive(Debug)]
struct Entry {
    handle: WatchHandle,
    refs: usize,
    /// The backend reported this watcher dead; it needs a fresh one.
    lost: bool,
}

/// Outcome of [`WatchMultiplexer::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// 0 → 1: a new backend watcher was started.
    Started,
    /// The path was already watched; only the count moved.
    Shared,
}

/// Outcome of [`WatchMultiplexer::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// 1 → 0: the backend watcher was stopped.
    Stopped,
    /// Other holders remain.
    Shared,
}

pub struct WatchMultiplexer<B> {
    backend: B,
    entries: HashMap<PathBuf, Entry>,
}

impl<B: WatchBackend> WatchMultiplexer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
        }
    }

    /// Take one reference on `path`, starting its watcher on the first one.
    ///
    /// On failure nothing is recorded, so the caller can simply skip the path.
    pub fn acquire(&mut self, path: &Path) -> Result<Acquired> {
        self.acquire_many(path, 1)
    }

    /// Take `count` references on `path` at once (at least one is taken).
    pub fn acquire_many(&mut self, path: &Path, count: usize) -> Result<Acquired> {
        let count = count.max(1);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.refs += count;
            return Ok(Acquired::Shared);
        }

        let handle = self.backend.watch(path)?;
        debug!(path = %path.display(), refs = count, "watch started");
        self.entries.insert(path.to_path_buf(), Entry {
            handle,
            refs: count,
            lost: false,
        });
        Ok(Acquired::Started)
    }

    /// Drop one reference on `path`, stopping its watcher on the last one.
    pub fn release(&mut self, path: &Path) -> Result<Released> {
        let Some(entry) = self.entries.get_mut(path) else {
            error!(
                path = %path.display(),
                watched = self.entries.len(),
                "released a path with zero references, watch refcount is corrupt"
            );
            return Err(Error::NotWatched {
                path: path.to_path_buf(),
            });
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(Released::Shared);
        }

        let handle = entry.handle;
        self.entries.remove(path);
        self.backend.unwatch(handle);
        debug!(path = %path.display(), "watch stopped");
        Ok(Released::Stopped)
    }

    /// Flag the watcher on `path` as dead. Returns `false` for unwatched paths.
    pub fn mark_lost(&mut self, path: &Path) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) => {
                if !entry.lost {
                    debug!(path = %path.display(), "watch lost");
                }
                entry.lost = true;
                true
            },
            None => false,
        }
    }

    /// Replace every lost watcher whose path can be watched again, keeping
    /// its reference count. Returns the restored paths, sorted.
    pub fn restore_lost(&mut self) -> Vec<PathBuf> {
        let mut restored = Vec::new();
        for (path, entry) in self.entries.iter_mut().filter(|(_, e)| e.lost) {
            match self.backend.watch(path) {
                Ok(handle) => {
                    self.backend.unwatch(entry.handle);
                    entry.handle = handle;
                    entry.lost = false;
                    debug!(path = %path.display(), "watch restored");
                    restored.push(path.clone());
                },
                Err(e) => debug!(path = %path.display(), error = %e, "lost watch not restorable yet"),
            }
        }
        restored.sort();
        restored
    }

    pub fn is_lost(&self, path: &Path) -> bool {
        self.entries.get(path).is_some_and(|e| e.lost)
    }

    pub fn ref_count(&self, path: &Path) -> usize {
        self.entries.get(path).map_or(0, |e| e.refs)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Watched paths with their reference counts, sorted by path.
    pub fn watched(&self) -> Vec<(PathBuf, usize)> {
        let mut out: Vec<(PathBuf, usize)> = self
            .entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.refs))
            .collect();
        out.sort();
        out
    }
}
