#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end runs against the real filesystem watcher.

use std::{path::Path, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    skillport_resources::{
        NotificationSink, NotifyBackend, ResourceUri, SubscriptionEngine, spawn,
    },
    skillport_skills::{MetadataStore, SkillMetadata, SkillSource},
    tokio::sync::mpsc,
};

const SETTLE: Duration = Duration::from_millis(30);
const WINDOW: Duration = Duration::from_millis(100);

struct ChannelSink(mpsc::UnboundedSender<(&'static str, ResourceUri)>);

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn resource_updated(&self, uri: &ResourceUri) -> anyhow::Result<()> {
        self.0.send(("updated", uri.clone()))?;
        Ok(())
    }

    async fn resource_removed(&self, uri: &ResourceUri) -> anyhow::Result<()> {
        self.0.send(("removed", uri.clone()))?;
        Ok(())
    }
}

fn write_skill(root: &Path, name: &str, body: &str) -> SkillMetadata {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("SKILL.md"),
        format!("---\nname: {name}\ndescription: {name} skill\n---\n{body}\n"),
    )
    .unwrap();
    SkillMetadata {
        name: name.into(),
        description: format!("{name} skill"),
        license: None,
        compatibility: None,
        allowed_tools: Vec::new(),
        path: dir,
        source: Some(SkillSource::Project),
    }
}

async fn next(
    rx: &mut mpsc::UnboundedReceiver<(&'static str, ResourceUri)>,
    within: Duration,
) -> Option<(&'static str, ResourceUri)> {
    tokio::time::timeout(within, rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn manifest_write_is_notified_until_unsubscribed() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let pdf = write_skill(&root, "pdf", "v1");
    let store = Arc::new(MetadataStore::from_discovered(vec![pdf]));

    let (backend, raw_rx) = NotifyBackend::channel(SETTLE);
    let engine = SubscriptionEngine::new(store, backend, WINDOW);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn(engine, raw_rx, Arc::new(ChannelSink(tx)));

    let uri = ResourceUri::manifest("pdf");
    let paths = handle.subscribe(uri.clone()).await.unwrap();
    assert_eq!(paths, vec![root.join("pdf/SKILL.md")]);

    // Files that already exist at subscribe time are not reported.
    assert_eq!(next(&mut rx, Duration::from_millis(400)).await, None);

    std::fs::write(root.join("pdf/SKILL.md"), "---\nname: pdf\n---\nv2\n").unwrap();
    assert_eq!(
        next(&mut rx, Duration::from_secs(5)).await,
        Some(("updated", uri.clone()))
    );

    assert!(handle.unsubscribe(uri).await.unwrap());
    assert!(handle.snapshot().await.unwrap().watched.is_empty());
    std::fs::write(root.join("pdf/SKILL.md"), "---\nname: pdf\n---\nv3\n").unwrap();
    assert_eq!(next(&mut rx, Duration::from_millis(500)).await, None);
}

#[tokio::test]
async fn reconcile_moves_collection_watch_and_reports_removal() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let a = write_skill(&root, "alpha", "a");
    let b = write_skill(&root, "beta", "b");
    let store = Arc::new(MetadataStore::from_discovered(vec![a.clone(), b]));

    let (backend, raw_rx) = NotifyBackend::channel(SETTLE);
    let engine = SubscriptionEngine::new(store, backend, WINDOW);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn(engine, raw_rx, Arc::new(ChannelSink(tx)));

    handle.subscribe(ResourceUri::all_skills()).await.unwrap();
    handle.subscribe(ResourceUri::collection("beta")).await.unwrap();

    let gamma = write_skill(&root, "gamma", "c");
    let report = handle
        .reconcile(Arc::new(MetadataStore::from_discovered(vec![a, gamma])))
        .await
        .unwrap();
    assert_eq!(report.updated, vec![ResourceUri::all_skills()]);
    assert_eq!(report.removed, vec![ResourceUri::collection("beta")]);
    assert_eq!(
        next(&mut rx, Duration::from_secs(1)).await,
        Some(("removed", ResourceUri::collection("beta")))
    );
    // The catalog gained gamma, so `skill://` subscribers hear about it.
    assert_eq!(
        next(&mut rx, Duration::from_secs(1)).await,
        Some(("updated", ResourceUri::all_skills()))
    );

    let watched = handle.snapshot().await.unwrap().watched;
    assert_eq!(watched, vec![(root.join("alpha"), 1), (root.join("gamma"), 1)]);

    std::fs::write(root.join("gamma/extra.md"), "more").unwrap();
    assert_eq!(
        next(&mut rx, Duration::from_secs(5)).await,
        Some(("updated", ResourceUri::all_skills()))
    );
}

#[tokio::test]
async fn manifest_saved_by_rename_keeps_notifying() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let pdf = write_skill(&root, "pdf", "v1");
    let store = Arc::new(MetadataStore::from_discovered(vec![pdf]));

    let (backend, raw_rx) = NotifyBackend::channel(SETTLE);
    let engine = SubscriptionEngine::new(store, backend, WINDOW);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn(engine, raw_rx, Arc::new(ChannelSink(tx)));

    let uri = ResourceUri::manifest("pdf");
    handle.subscribe(uri.clone()).await.unwrap();
    let manifest = root.join("pdf/SKILL.md");
    let scratch = root.join("pdf/.SKILL.md.swp");

    for version in 2..5 {
        std::fs::write(&scratch, format!("---\nname: pdf\n---\nv{version}\n")).unwrap();
        std::fs::rename(&scratch, &manifest).unwrap();
        assert_eq!(
            next(&mut rx, Duration::from_secs(5)).await,
            Some(("updated", uri.clone())),
            "save of v{version}"
        );
    }

    // Siblings of the manifest are not part of it.
    std::fs::write(root.join("pdf/notes.md"), "notes").unwrap();
    assert_eq!(next(&mut rx, Duration::from_millis(500)).await, None);
    assert_eq!(handle.snapshot().await.unwrap().watched, vec![(manifest, 1)]);
}

#[tokio::test]
async fn recreated_skill_directory_is_watched_again_after_reconcile() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let pdf = write_skill(&root, "pdf", "v1");
    let store = Arc::new(MetadataStore::from_discovered(vec![pdf]));

    let (backend, raw_rx) = NotifyBackend::channel(SETTLE);
    let engine = SubscriptionEngine::new(store, backend, WINDOW);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn(engine, raw_rx, Arc::new(ChannelSink(tx)));

    let uri = ResourceUri::collection("pdf");
    handle.subscribe(uri.clone()).await.unwrap();

    std::fs::remove_dir_all(root.join("pdf")).unwrap();
    assert_eq!(
        next(&mut rx, Duration::from_secs(5)).await,
        Some(("updated", uri.clone()))
    );
    // Let every report about the removal land before the directory returns.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while rx.try_recv().is_ok() {}

    let pdf = write_skill(&root, "pdf", "v2");
    let report = handle
        .reconcile(Arc::new(MetadataStore::from_discovered(vec![pdf])))
        .await
        .unwrap();
    assert_eq!(report.restored, 1);
    assert!(report.updated.is_empty());
    assert!(report.removed.is_empty());
    assert_eq!(
        next(&mut rx, Duration::from_secs(1)).await,
        Some(("updated", uri.clone()))
    );

    std::fs::write(root.join("pdf/extra.md"), "more").unwrap();
    assert_eq!(
        next(&mut rx, Duration::from_secs(5)).await,
        Some(("updated", uri))
    );
    assert_eq!(handle.snapshot().await.unwrap().watched, vec![(root.join("pdf"), 1)]);
}
