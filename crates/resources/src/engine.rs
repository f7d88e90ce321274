//! Synchronous subscription engine.
//!
//! Every method completes its mutations before returning, so a caller that
//! owns the engine on a single task never exposes a half-applied graph.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    serde::Serialize,
    skillport_skills::MetadataStore,
    tokio::time::Instant,
    tracing::{debug, info, warn},
};

use crate::{
    debounce::Debouncer,
    error::{Error, Result},
    graph::SubscriptionGraph,
    multiplexer::{Acquired, Released, WatchBackend, WatchMultiplexer},
    reconcile::{self, ReconcileReport},
    resolve::resolve,
    uri::ResourceUri,
};

/// Result of a successful subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscribed {
    /// Paths now watched on behalf of the identifier.
    pub paths: Vec<PathBuf>,
    /// The identifier was already subscribed; nothing changed.
    pub existing: bool,
}

/// Point-in-time view of engine state, for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub subscriptions: Vec<(ResourceUri, Vec<PathBuf>)>,
    pub watched: Vec<(PathBuf, usize)>,
    pub pending: usize,
}

pub struct SubscriptionEngine<B> {
    store: Arc<MetadataStore>,
    graph: SubscriptionGraph,
    watches: WatchMultiplexer<B>,
    debouncer: Debouncer,
}

impl<B: WatchBackend> SubscriptionEngine<B> {
    pub fn new(store: Arc<MetadataStore>, backend: B, window: Duration) -> Self {
        Self {
            store,
            graph: SubscriptionGraph::new(),
            watches: WatchMultiplexer::new(backend),
            debouncer: Debouncer::new(window),
        }
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn is_subscribed(&self, uri: &ResourceUri) -> bool {
        self.graph.contains(uri)
    }

    pub fn is_pending(&self, uri: &ResourceUri) -> bool {
        self.debouncer.is_pending(uri)
    }

    pub fn watches(&self) -> &WatchMultiplexer<B> {
        &self.watches
    }

    /// Start tracking `uri`.
    ///
    /// Paths the backend refuses to watch are skipped; if none can be
    /// watched the call degrades to [`Error::ResourceNotFound`].
    pub fn subscribe(&mut self, uri: &ResourceUri) -> Result<Subscribed> {
        if let Some(existing) = self.graph.get(uri) {
            return Ok(Subscribed {
                paths: existing.paths.iter().cloned().collect(),
                existing: true,
            });
        }

        let resolved = resolve(uri, &self.store);
        if resolved.is_empty() {
            debug!(%uri, "subscribe: resource not found");
            return Err(Error::not_found(uri.as_str()));
        }

        let mut held = BTreeSet::new();
        for path in resolved {
            match self.watches.acquire(&path) {
                Ok(_) => {
                    held.insert(path);
                },
                Err(e) => warn!(%uri, path = %path.display(), error = %e, "skipping unwatchable path"),
            }
        }

        if held.is_empty() {
            return Err(Error::not_found(uri.as_str()));
        }

        info!(%uri, paths = held.len(), "subscribed");
        let paths = held.iter().cloned().collect();
        self.graph.insert(uri.clone(), held);
        Ok(Subscribed {
            paths,
            existing: false,
        })
    }

    /// Stop tracking `uri`. Unknown identifiers are a no-op returning `false`.
    pub fn unsubscribe(&mut self, uri: &ResourceUri) -> bool {
        self.debouncer.cancel(uri);
        let Some(subscription) = self.graph.remove(uri) else {
            return false;
        };
        for path in &subscription.paths {
            self.release_logged(path);
        }
        info!(%uri, "unsubscribed");
        true
    }

    /// Move every subscription onto a freshly discovered store in one pass.
    ///
    /// Identifiers that survive with a different path set are armed at `now`,
    /// as are the holders of any lost watcher that could be re-established.
    pub fn reconcile(&mut self, store: Arc<MetadataStore>, now: Instant) -> ReconcileReport {
        let plan = reconcile::plan(&self.graph, &store);
        self.store = store;

        let mut report = ReconcileReport::default();
        if !plan.is_noop() {
            self.apply(plan, now, &mut report);
        }

        let restored = self.watches.restore_lost();
        report.restored = restored.len();
        for path in &restored {
            for uri in self.graph.affected_by(path) {
                self.debouncer.arm(&uri, now);
            }
        }

        if report != ReconcileReport::default() {
            info!(
                updated = report.updated.len(),
                removed = report.removed.len(),
                started = report.started,
                stopped = report.stopped,
                restored = report.restored,
                "reconciled subscriptions"
            );
        }
        report
    }

    fn apply(&mut self, plan: reconcile::ReconcilePlan, now: Instant, report: &mut ReconcileReport) {
        // Acquire before release so a shared path never drops to zero mid-pass.
        let mut unwatchable = BTreeSet::new();
        for (path, count) in plan.acquisitions() {
            match self.watches.acquire_many(path, count) {
                Ok(Acquired::Started) => report.started += 1,
                Ok(Acquired::Shared) => {},
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "reconcile: skipping unwatchable path");
                    unwatchable.insert(path.clone());
                },
            }
        }
        for (path, count) in plan.releases() {
            for _ in 0..count {
                if self.release_logged(path) == Some(Released::Stopped) {
                    report.stopped += 1;
                }
            }
        }

        for (uri, mut paths) in plan.updates {
            paths.retain(|p| !unwatchable.contains(p));
            if paths.is_empty() {
                self.graph.remove(&uri);
                self.debouncer.cancel(&uri);
                report.removed.push(uri);
            } else {
                self.graph.replace_paths(&uri, paths);
                self.debouncer.arm(&uri, now);
                report.updated.push(uri);
            }
        }
        for uri in plan.removed {
            self.graph.remove(&uri);
            self.debouncer.cancel(&uri);
            info!(%uri, "subscription dropped, resource no longer exists");
            report.removed.push(uri);
        }
        report.removed.sort();
    }

    /// The watcher on `watched` died with its directory. Arms its holders and
    /// tries to re-establish it right away; a path that is still missing is
    /// retried on the next reconcile.
    pub fn on_watch_lost(&mut self, watched: &Path, now: Instant) -> Vec<ResourceUri> {
        if !self.watches.mark_lost(watched) {
            return Vec::new();
        }
        warn!(path = %watched.display(), "watched path was removed or replaced");
        let affected = self.on_raw_event(watched, now);
        for path in self.watches.restore_lost() {
            info!(path = %path.display(), "watch re-established");
        }
        affected
    }

    /// Arm the debounce timer of every identifier affected by `changed`.
    pub fn on_raw_event(&mut self, changed: &Path, now: Instant) -> Vec<ResourceUri> {
        let affected: Vec<ResourceUri> = self.graph.affected_by(changed).into_iter().collect();
        for uri in &affected {
            self.debouncer.arm(uri, now);
        }
        if !affected.is_empty() {
            debug!(path = %changed.display(), count = affected.len(), "change armed notifications");
        }
        affected
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Identifiers whose quiet period has elapsed, each returned once.
    pub fn take_due(&mut self, now: Instant) -> Vec<ResourceUri> {
        self.debouncer.take_due(now)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut subscriptions: Vec<(ResourceUri, Vec<PathBuf>)> = self
            .graph
            .iter()
            .map(|s| (s.uri.clone(), s.paths.iter().cloned().collect()))
            .collect();
        subscriptions.sort();
        EngineSnapshot {
            subscriptions,
            watched: self.watches.watched(),
            pending: self.debouncer.pending_count(),
        }
    }

    fn release_logged(&mut self, path: &Path) -> Option<Released> {
        // The multiplexer already logged the violation with context.
        self.watches.release(path).ok()
    }
}
