//! Single-task owner of a [`SubscriptionEngine`].
//!
//! Commands, raw filesystem events, and debounce expiry are all handled on
//! one task, one at a time. Engine mutations never straddle an `.await`;
//! the only suspension points are deliveries to the [`NotificationSink`].

use std::{path::PathBuf, sync::Arc};

use {
    async_trait::async_trait,
    skillport_skills::MetadataStore,
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
        time::{Instant, sleep_until},
    },
    tracing::{debug, warn},
};

use crate::{
    engine::{EngineSnapshot, Subscribed, SubscriptionEngine},
    error::{Error, Result},
    multiplexer::{RawEvent, WatchBackend},
    reconcile::ReconcileReport,
    uri::ResourceUri,
};

/// Outbound notification hook, implemented by the transport.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// The resource behind `uri` changed and should be re-read.
    async fn resource_updated(&self, uri: &ResourceUri) -> anyhow::Result<()>;

    /// The resource behind `uri` no longer exists; its subscription was dropped.
    async fn resource_removed(&self, uri: &ResourceUri) -> anyhow::Result<()>;
}

enum Command {
    Subscribe {
        uri: ResourceUri,
        reply: oneshot::Sender<Result<Subscribed>>,
    },
    Unsubscribe {
        uri: ResourceUri,
        reply: oneshot::Sender<bool>,
    },
    Reconcile {
        store: Arc<MetadataStore>,
        reply: oneshot::Sender<ReconcileReport>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
}

/// Cloneable front door to a running engine task.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Subscribe to `uri`, returning the watched paths or `ResourceNotFound`.
    pub async fn subscribe(&self, uri: ResourceUri) -> Result<Vec<PathBuf>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe { uri, reply })?;
        let subscribed = rx.await.map_err(|_| Error::EngineClosed)??;
        Ok(subscribed.paths)
    }

    /// Unsubscribe from `uri`. Returns whether a subscription existed.
    pub async fn unsubscribe(&self, uri: ResourceUri) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe { uri, reply })?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Apply a rebuilt metadata store to every live subscription.
    pub async fn reconcile(&self, store: Arc<MetadataStore>) -> Result<ReconcileReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reconcile { store, reply })?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::EngineClosed)
    }
}

/// Spawn the engine task. It exits once every [`EngineHandle`] is dropped.
pub fn spawn<B>(
    engine: SubscriptionEngine<B>,
    raw_events: mpsc::UnboundedReceiver<RawEvent>,
    sink: Arc<dyn NotificationSink>,
) -> (EngineHandle, JoinHandle<()>)
where
    B: WatchBackend + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = EngineActor {
        engine,
        commands: rx,
        raw_events,
        sink,
    };
    let task = tokio::spawn(actor.run());
    (EngineHandle { commands: tx }, task)
}

struct EngineActor<B> {
    engine: SubscriptionEngine<B>,
    commands: mpsc::UnboundedReceiver<Command>,
    raw_events: mpsc::UnboundedReceiver<RawEvent>,
    sink: Arc<dyn NotificationSink>,
}

impl<B: WatchBackend> EngineActor<B> {
    async fn run(mut self) {
        loop {
            let deadline = self.engine.next_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(event) = self.raw_events.recv() => {
                    if event.watch_lost {
                        self.engine.on_watch_lost(&event.watched, Instant::now());
                    } else {
                        self.engine.on_raw_event(&event.changed, Instant::now());
                    }
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deliver_due().await;
                },
            }
        }
        debug!("subscription engine stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe { uri, reply } => {
                let _ = reply.send(self.engine.subscribe(&uri));
            },
            Command::Unsubscribe { uri, reply } => {
                let _ = reply.send(self.engine.unsubscribe(&uri));
            },
            Command::Reconcile { store, reply } => {
                let report = self.engine.reconcile(store, Instant::now());
                for uri in &report.removed {
                    if let Err(e) = self.sink.resource_removed(uri).await {
                        warn!(%uri, error = %e, "failed to deliver removal notification");
                    }
                }
                let _ = reply.send(report);
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            },
        }
    }

    async fn deliver_due(&mut self) {
        for uri in self.engine.take_due(Instant::now()) {
            if !self.engine.is_subscribed(&uri) {
                continue;
            }
            if let Err(e) = self.sink.resource_updated(&uri).await {
                warn!(%uri, error = %e, "failed to deliver update notification");
            }
        }
    }
}
