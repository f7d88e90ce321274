//! Stdio host: line-delimited JSON-RPC on stdin/stdout.

use std::{pin::Pin, sync::Arc};

use {
    async_trait::async_trait,
    serde::Serialize,
    serde_json::{Value, json},
    skillport_config::SkillportConfig,
    skillport_protocol::{
        InitializeResult, JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
        JsonRpcResponse, MAX_LINE_BYTES, ResourceParams, error_codes, methods,
    },
    skillport_resources::{
        EngineHandle, Error as ResourceError, NotificationSink, NotifyBackend, ReconcileReport,
        ResourceUri, SubscriptionEngine, list_resources, read_resource,
    },
    skillport_skills::{MetadataStore, SkillDiscoverer},
    tokio::{
        io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
        sync::{Mutex, RwLock},
    },
    tracing::{debug, info, warn},
};

const SERVER_NAME: &str = "skillport";

// ── Output ───────────────────────────────────────────────────────────────────

/// Serialized writer shared by responses and notifications. One message per line.
#[derive(Clone)]
pub struct Outbox {
    writer: Arc<Mutex<Pin<Box<dyn AsyncWrite + Send>>>>,
}

impl Outbox {
    pub fn new(writer: impl AsyncWrite + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::pin(writer))),
        }
    }

    pub async fn send<T: Serialize>(&self, message: &T) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Delivers engine notifications to the client.
struct StdioSink {
    outbox: Outbox,
}

#[async_trait]
impl NotificationSink for StdioSink {
    async fn resource_updated(&self, uri: &ResourceUri) -> anyhow::Result<()> {
        self.outbox
            .send(&JsonRpcNotification::resource_updated(uri.as_str()))
            .await
    }

    async fn resource_removed(&self, uri: &ResourceUri) -> anyhow::Result<()> {
        self.outbox
            .send(&JsonRpcNotification::resource_removed(uri.as_str()))
            .await
    }
}

// ── Host ─────────────────────────────────────────────────────────────────────

pub struct Host {
    engine: EngineHandle,
    store: RwLock<Arc<MetadataStore>>,
    outbox: Outbox,
}

impl Host {
    /// Spawn the subscription engine on `store` and wire its notifications to `outbox`.
    pub fn start(store: Arc<MetadataStore>, config: &SkillportConfig, outbox: Outbox) -> Self {
        let (backend, raw_events) = NotifyBackend::channel(config.watch.settle());
        let engine = SubscriptionEngine::new(Arc::clone(&store), backend, config.watch.debounce());
        let sink = Arc::new(StdioSink {
            outbox: outbox.clone(),
        });
        let (engine, _task) = skillport_resources::spawn(engine, raw_events, sink);
        Self {
            engine,
            store: RwLock::new(store),
            outbox,
        }
    }

    pub async fn store(&self) -> Arc<MetadataStore> {
        Arc::clone(&*self.store.read().await)
    }

    /// Handle one input line. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.len() > MAX_LINE_BYTES {
            warn!(bytes = line.len(), "dropping oversized message");
            return Some(JsonRpcResponse::err(
                Value::Null,
                JsonRpcError::new(error_codes::INVALID_REQUEST, "message too large"),
            ));
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "unparseable message");
                return Some(JsonRpcResponse::err(
                    Value::Null,
                    JsonRpcError::new(error_codes::PARSE_ERROR, format!("parse error: {e}")),
                ));
            },
        };
        self.handle(request).await
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "client notification");
            return None;
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::err(
                id,
                JsonRpcError::new(error_codes::INVALID_REQUEST, "unsupported jsonrpc version"),
            ));
        }

        Some(match self.dispatch(&request).await {
            Ok(result) => JsonRpcResponse::ok(id, result),
            Err(error) => {
                debug!(method = %request.method, code = error.code, message = %error.message, "request failed");
                JsonRpcResponse::err(id, error)
            },
        })
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            methods::INITIALIZE => to_value(&InitializeResult::new(
                SERVER_NAME,
                env!("CARGO_PKG_VERSION"),
            )),
            methods::PING => Ok(json!({})),
            methods::RESOURCES_LIST => {
                let store = self.store().await;
                Ok(json!({ "resources": list_resources(&store) }))
            },
            methods::RESOURCES_READ => {
                let params: ResourceParams = request.parse_params()?;
                let store = self.store().await;
                let contents = read_resource(&store, &ResourceUri::from(params.uri))
                    .await
                    .map_err(rpc_error)?;
                Ok(json!({ "contents": [contents] }))
            },
            methods::RESOURCES_SUBSCRIBE => {
                let params: ResourceParams = request.parse_params()?;
                self.engine
                    .subscribe(ResourceUri::from(params.uri))
                    .await
                    .map_err(rpc_error)?;
                Ok(json!({}))
            },
            methods::RESOURCES_UNSUBSCRIBE => {
                let params: ResourceParams = request.parse_params()?;
                self.engine
                    .unsubscribe(ResourceUri::from(params.uri))
                    .await
                    .map_err(rpc_error)?;
                Ok(json!({}))
            },
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    /// Rerun discovery, move every subscription onto the new store, and tell
    /// the client when the set of skills changed.
    pub async fn rescan(&self, discoverer: &dyn SkillDiscoverer) -> anyhow::Result<ReconcileReport> {
        let next = MetadataStore::rebuild(discoverer).await?;
        let previous = {
            let mut store = self.store.write().await;
            std::mem::replace(&mut *store, Arc::clone(&next))
        };
        let report = self.engine.reconcile(Arc::clone(&next)).await?;

        if !previous.same_names(&next) {
            info!(
                before = previous.len(),
                after = next.len(),
                "skill set changed"
            );
            self.outbox
                .send(&JsonRpcNotification::resource_list_changed())
                .await?;
        }
        Ok(report)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
}

fn rpc_error(error: ResourceError) -> JsonRpcError {
    match error {
        ResourceError::ResourceNotFound { uri } => JsonRpcError::resource_not_found(&uri),
        other => JsonRpcError::new(error_codes::INTERNAL_ERROR, other.to_string()),
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

pub async fn run<D>(config: &SkillportConfig, discoverer: D) -> anyhow::Result<()>
where
    D: SkillDiscoverer + 'static,
{
    let discoverer: Arc<dyn SkillDiscoverer> = Arc::new(discoverer);
    let store = MetadataStore::rebuild(discoverer.as_ref()).await?;
    info!(
        skills = store.len(),
        roots = discoverer.search_roots().len(),
        "skills discovered"
    );

    let outbox = Outbox::new(tokio::io::stdout());
    let host = Arc::new(Host::start(store, config, outbox.clone()));

    #[cfg(feature = "file-watcher")]
    let _rescans = spawn_rescans(config, &host, &discoverer)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(response) = host.handle_line(&line).await {
            outbox.send(&response).await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}

/// Rediscover skills whenever a SKILL.md under a search root changes.
#[cfg(feature = "file-watcher")]
fn spawn_rescans(
    config: &SkillportConfig,
    host: &Arc<Host>,
    discoverer: &Arc<dyn SkillDiscoverer>,
) -> anyhow::Result<Option<RescanTask>> {
    use skillport_skills::watcher::SkillRootWatcher;

    if !config.watch.rescan_on_change {
        return Ok(None);
    }

    let (watcher, mut events) =
        SkillRootWatcher::start(&discoverer.search_roots(), config.watch.settle())?;
    let host = Arc::clone(host);
    let discoverer = Arc::clone(discoverer);
    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "skill root changed, rescanning");
            match host.rescan(discoverer.as_ref()).await {
                Ok(report) => debug!(?report, "rescan complete"),
                Err(e) => warn!(error = %e, "rescan failed"),
            }
        }
    });

    Ok(Some(RescanTask {
        _watcher: watcher,
        task,
    }))
}

/// Keeps the root watcher alive; aborts the rescan loop on drop.
#[cfg(feature = "file-watcher")]
struct RescanTask {
    _watcher: skillport_skills::watcher::SkillRootWatcher,
    task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "file-watcher")]
impl Drop for RescanTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}
