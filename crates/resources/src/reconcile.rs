//! Diff every live subscription against a rebuilt metadata store.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use {serde::Serialize, skillport_skills::MetadataStore};

use crate::{graph::SubscriptionGraph, resolve::resolve, uri::ResourceUri};

/// What a reconcile pass has to do, computed without side effects.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Subscriptions whose path set changes but stays non-empty.
    pub updates: BTreeMap<ResourceUri, BTreeSet<PathBuf>>,
    /// Subscriptions that no longer resolve to anything.
    pub removed: BTreeSet<ResourceUri>,
    /// Net refcount change per path across all subscriptions.
    pub deltas: BTreeMap<PathBuf, i64>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty() && self.removed.is_empty() && self.deltas.is_empty()
    }

    pub fn acquisitions(&self) -> impl Iterator<Item = (&PathBuf, usize)> {
        self.deltas
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(p, d)| (p, d.unsigned_abs() as usize))
    }

    pub fn releases(&self) -> impl Iterator<Item = (&PathBuf, usize)> {
        self.deltas
            .iter()
            .filter(|(_, d)| **d < 0)
            .map(|(p, d)| (p, d.unsigned_abs() as usize))
    }
}

/// Summary returned to the caller after a reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Identifiers whose path set changed and which are still subscribed.
    pub updated: Vec<ResourceUri>,
    /// Identifiers dropped because their skill vanished.
    pub removed: Vec<ResourceUri>,
    /// Backend watchers started.
    pub started: usize,
    /// Backend watchers stopped.
    pub stopped: usize,
    /// Watchers re-established on paths whose directory was replaced.
    pub restored: usize,
}

/// Compute the plan for moving `graph` onto `store`.
///
/// Deltas are netted across identifiers: a path dropped by one identifier
/// and picked up by another in the same pass nets to zero and is left alone.
pub fn plan(graph: &SubscriptionGraph, store: &MetadataStore) -> ReconcilePlan {
    let mut out = ReconcilePlan::default();

    for subscription in graph.iter() {
        let resolved: BTreeSet<PathBuf> = resolve(&subscription.uri, store).into_iter().collect();
        if resolved == subscription.paths {
            continue;
        }

        for dropped in subscription.paths.difference(&resolved) {
            *out.deltas.entry(dropped.clone()).or_default() -= 1;
        }
        for added in resolved.difference(&subscription.paths) {
            *out.deltas.entry(added.clone()).or_default() += 1;
        }

        if resolved.is_empty() {
            out.removed.insert(subscription.uri.clone());
        } else {
            out.updates.insert(subscription.uri.clone(), resolved);
        }
    }

    out.deltas.retain(|_, delta| *delta != 0);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::store_of};

    fn graph_on(store: &MetadataStore, uris: &[ResourceUri]) -> SubscriptionGraph {
        let mut graph = SubscriptionGraph::new();
        for uri in uris {
            graph.insert(uri.clone(), resolve(uri, store).into_iter().collect());
        }
        graph
    }

    #[test]
    fn unchanged_store_plans_nothing() {
        let store = store_of(&[("a", "/s/a"), ("b", "/s/b")]);
        let graph = graph_on(&store, &[
            ResourceUri::all_skills(),
            ResourceUri::manifest("a"),
        ]);
        assert!(plan(&graph, &store).is_noop());
    }

    #[test]
    fn swapped_skill_releases_old_and_acquires_new() {
        let before = store_of(&[("a", "/s/a"), ("b", "/s/b")]);
        let after = store_of(&[("a", "/s/a"), ("c", "/s/c")]);
        let graph = graph_on(&before, &[ResourceUri::all_skills()]);

        let plan = plan(&graph, &after);
        assert_eq!(
            plan.deltas,
            BTreeMap::from([(PathBuf::from("/s/b"), -1), (PathBuf::from("/s/c"), 1)])
        );
        assert!(plan.removed.is_empty());
        assert_eq!(
            plan.updates[&ResourceUri::all_skills()],
            BTreeSet::from([PathBuf::from("/s/a"), PathBuf::from("/s/c")])
        );
    }

    #[test]
    fn vanished_skill_is_removed() {
        let before = store_of(&[("a", "/s/a")]);
        let after = store_of(&[]);
        let graph = graph_on(&before, &[
            ResourceUri::manifest("a"),
            ResourceUri::collection("a"),
        ]);

        let plan = plan(&graph, &after);
        assert_eq!(
            plan.removed,
            BTreeSet::from([ResourceUri::manifest("a"), ResourceUri::collection("a")])
        );
        assert_eq!(plan.releases().count(), 2);
        assert_eq!(plan.acquisitions().count(), 0);
    }

    #[test]
    fn moved_directory_nets_across_identifiers() {
        // Skill "b" moves into the directory "a" used to have; "a" moves elsewhere.
        let before = store_of(&[("a", "/s/one"), ("b", "/s/two")]);
        let after = store_of(&[("a", "/s/three"), ("b", "/s/one")]);
        let graph = graph_on(&before, &[
            ResourceUri::collection("a"),
            ResourceUri::collection("b"),
        ]);

        let plan = plan(&graph, &after);
        assert!(!plan.deltas.contains_key(&PathBuf::from("/s/one")));
        assert_eq!(plan.deltas[&PathBuf::from("/s/two")], -1);
        assert_eq!(plan.deltas[&PathBuf::from("/s/three")], 1);
        assert_eq!(plan.updates.len(), 2);
    }
}
