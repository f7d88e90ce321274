//! Bidirectional identifier ↔ watched-path mapping.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::uri::ResourceUri;

/// An active client subscription and the paths it holds references on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub uri: ResourceUri,
    pub paths: BTreeSet<PathBuf>,
    pub created_at: SystemTime,
}

/// Owns every [`Subscription`] plus the reverse `path → identifiers` index.
///
/// Pure bookkeeping: watcher lifecycle is driven by the engine, which keeps
/// the multiplexer's refcount for a path equal to the number of
/// subscriptions listing it.
#[derive(Debug, Default)]
pub struct SubscriptionGraph {
    subscriptions: HashMap<ResourceUri, Subscription>,
    by_path: HashMap<PathBuf, BTreeSet<ResourceUri>>,
}

impl SubscriptionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: ResourceUri, paths: BTreeSet<PathBuf>) {
        self.remove(&uri);
        for path in &paths {
            self.by_path
                .entry(path.clone())
                .or_default()
                .insert(uri.clone());
        }
        self.subscriptions.insert(uri.clone(), Subscription {
            uri,
            paths,
            created_at: SystemTime::now(),
        });
    }

    pub fn remove(&mut self, uri: &ResourceUri) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(uri)?;
        for path in &subscription.paths {
            self.unindex(path, uri);
        }
        Some(subscription)
    }

    /// Swap the path set of an existing subscription, keeping `created_at`.
    pub fn replace_paths(&mut self, uri: &ResourceUri, paths: BTreeSet<PathBuf>) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(uri) else {
            return false;
        };
        let old = std::mem::replace(&mut subscription.paths, paths);
        let new = subscription.paths.clone();

        for path in old.difference(&new) {
            self.unindex(path, uri);
        }
        for path in new.difference(&old) {
            self.by_path
                .entry(path.clone())
                .or_default()
                .insert(uri.clone());
        }
        true
    }

    pub fn get(&self, uri: &ResourceUri) -> Option<&Subscription> {
        self.subscriptions.get(uri)
    }

    pub fn contains(&self, uri: &ResourceUri) -> bool {
        self.subscriptions.contains_key(uri)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Identifiers holding exactly `path`.
    pub fn holders(&self, path: &Path) -> Option<&BTreeSet<ResourceUri>> {
        self.by_path.get(path)
    }

    /// Identifiers affected by a change at `changed`: every subscription
    /// watching `changed` itself or one of its ancestor directories.
    pub fn affected_by(&self, changed: &Path) -> BTreeSet<ResourceUri> {
        changed
            .ancestors()
            .filter_map(|ancestor| self.by_path.get(ancestor))
            .flatten()
            .cloned()
            .collect()
    }

    fn unindex(&mut self, path: &Path, uri: &ResourceUri) {
        if let Some(holders) = self.by_path.get_mut(path) {
            holders.remove(uri);
            if holders.is_empty() {
                self.by_path.remove(path);
            }
        }
    }
}
