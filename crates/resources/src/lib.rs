//! Live-update subscriptions for skill resources.
//!
//! Clients subscribe to `skill://` identifiers. The engine resolves each one
//! to filesystem paths, shares one watcher per path across subscribers,
//! debounces bursts per identifier, and re-resolves everything when the
//! skill set is rediscovered.

pub mod actor;
pub mod backend;
pub mod contents;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod graph;
pub mod multiplexer;
pub mod reconcile;
pub mod resolve;
pub mod uri;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    actor::{EngineHandle, NotificationSink, spawn},
    backend::NotifyBackend,
    contents::{ResourceContents, ResourceEntry, list_resources, read_resource},
    debounce::DEFAULT_WINDOW,
    engine::{EngineSnapshot, Subscribed, SubscriptionEngine},
    error::{Error, Result},
    multiplexer::{RawEvent, WatchBackend, WatchHandle},
    reconcile::ReconcileReport,
    uri::{ResourceKind, ResourceUri},
};
