//! Filesystem watcher for skill search roots.
//!
//! Watches the discovery roots for SKILL.md create/modify/delete events and
//! signals through a channel so the host can rerun discovery and reconcile
//! live subscriptions.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    anyhow::Result,
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{EventKind, RecommendedWatcher, RecursiveMode},
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::types::SKILL_MANIFEST;

/// Events emitted by the root watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillRootEvent {
    /// At least one SKILL.md under a root was created, modified, or deleted.
    Changed { manifests: Vec<PathBuf> },
}

/// Watches skill search roots with debouncing.
pub struct SkillRootWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    watched: Vec<PathBuf>,
}

impl SkillRootWatcher {
    /// Start watching the given roots. Returns the watcher and a receiver for events.
    ///
    /// Roots that do not exist yet are skipped. The watcher must be kept alive
    /// (not dropped) for events to continue.
    pub fn start(
        roots: &[PathBuf],
        settle: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SkillRootEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(settle, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let mut manifests: Vec<PathBuf> = events
                        .iter()
                        .filter(|event| is_content_change(&event.kind))
                        .flat_map(|event| event.paths.iter())
                        .filter(|path| is_manifest(path))
                        .cloned()
                        .collect();
                    if manifests.is_empty() {
                        return;
                    }
                    manifests.sort();
                    manifests.dedup();
                    debug!(count = manifests.len(), "skill root watcher event");
                    let _ = tx.send(SkillRootEvent::Changed { manifests });
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "skill root watcher error");
                    }
                },
            }
        })?;

        let mut watcher = Self {
            _debouncer: debouncer,
            watched: Vec::new(),
        };

        for root in roots {
            if !root.is_dir() {
                continue;
            }
            match watcher._debouncer.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    info!(dir = %root.display(), "skill root watcher: watching directory");
                    watcher.watched.push(root.clone());
                },
                Err(e) => warn!(dir = %root.display(), error = %e, "cannot watch skill root"),
            }
        }

        Ok((watcher, rx))
    }

    pub fn watched_roots(&self) -> &[PathBuf] {
        &self.watched
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_manifest(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some(SKILL_MANIFEST)
}
