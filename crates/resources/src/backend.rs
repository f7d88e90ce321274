//! [`WatchBackend`] on top of `notify-debouncer-full`.
//!
//! Each watched path gets its own debouncer. The debouncer only reports a
//! file once writes to it have been quiet for `settle`, and never reports
//! files that already existed when watching started.
//!
//! Directories are watched recursively. A single file is watched through its
//! parent directory with events filtered down to that file, so an editor's
//! save-by-rename keeps being seen after the original inode is gone. When the
//! directory under watch disappears, a lost-watch [`RawEvent`] is emitted so
//! the owner can re-establish it.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{EventKind, RecommendedWatcher, RecursiveMode, event::ModifyKind},
    },
    tokio::sync::mpsc,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    multiplexer::{RawEvent, WatchBackend, WatchHandle},
};

type PathDebouncer = Debouncer<RecommendedWatcher, RecommendedCache>;

pub struct NotifyBackend {
    settle: Duration,
    events: mpsc::UnboundedSender<RawEvent>,
    watchers: HashMap<WatchHandle, PathDebouncer>,
    next_id: u64,
}

impl NotifyBackend {
    pub fn new(settle: Duration, events: mpsc::UnboundedSender<RawEvent>) -> Self {
        Self {
            settle,
            events,
            watchers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Backend plus the receiving end of its raw event stream.
    pub fn channel(settle: Duration) -> (Self, mpsc::UnboundedReceiver<RawEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(settle, tx), rx)
    }
}

/// What one debouncer listens on and what it reports.
struct Scope {
    /// Path the caller asked for; every event carries it.
    watched: PathBuf,
    /// Directory handed to the OS watcher.
    target: PathBuf,
    /// `watched` is a single file inside `target`.
    single_file: bool,
}

impl Scope {
    fn for_path(path: &Path) -> Self {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        match parent {
            Some(parent) if !path.is_dir() => Self {
                watched: path.to_path_buf(),
                target: parent.to_path_buf(),
                single_file: true,
            },
            _ => Self {
                watched: path.to_path_buf(),
                target: path.to_path_buf(),
                single_file: false,
            },
        }
    }

    fn mode(&self) -> RecursiveMode {
        if self.single_file {
            RecursiveMode::NonRecursive
        } else {
            RecursiveMode::Recursive
        }
    }

    fn reports(&self, path: &Path) -> bool {
        !self.single_file || path == self.watched.as_path()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<WatchHandle> {
        let scope = Scope::for_path(path);
        let target = scope.target.clone();
        let mode = scope.mode();

        let tx = self.events.clone();
        let mut debouncer = new_debouncer(self.settle, None, move |result: DebounceEventResult| {
            forward(&scope, result, &tx);
        })
        .map_err(|e| Error::watch(path, e))?;
        debouncer
            .watch(&target, mode)
            .map_err(|e| Error::watch(path, e))?;

        self.next_id += 1;
        let handle = WatchHandle(self.next_id);
        self.watchers.insert(handle, debouncer);
        Ok(handle)
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        match self.watchers.remove(&handle) {
            // Joins the debouncer thread, so nothing is delivered afterwards.
            Some(debouncer) => debouncer.stop(),
            None => warn!(handle = handle.0, "unwatch of unknown handle"),
        }
    }
}

fn forward(scope: &Scope, result: DebounceEventResult, tx: &mpsc::UnboundedSender<RawEvent>) {
    let watched = &scope.watched;
    match result {
        Ok(events) => {
            let mut changed: Vec<PathBuf> = events
                .iter()
                .filter(|event| {
                    matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    )
                })
                .flat_map(|event| event.paths.iter())
                .filter(|path| scope.reports(path))
                .cloned()
                .collect();
            changed.sort();
            changed.dedup();

            for path in changed {
                debug!(watched = %watched.display(), path = %path.display(), "raw change");
                if tx.send(RawEvent::changed(watched.clone(), path)).is_err() {
                    // Engine is gone; nothing left to notify.
                    return;
                }
            }

            let target_gone = events.iter().any(|event| {
                matches!(
                    event.kind,
                    EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
                ) && event.paths.contains(&scope.target)
            });
            if (target_gone || !scope.target.exists())
                && tx.send(RawEvent::lost(watched.clone())).is_ok()
            {
                debug!(watched = %watched.display(), target = %scope.target.display(), "watch lost");
            }
        },
        Err(errors) => {
            for e in errors {
                warn!(watched = %watched.display(), error = %e, "watcher error");
            }
        },
    }
}
