//! Test fixtures: an in-memory store builder and a recording watch backend.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use skillport_skills::{MetadataStore, SkillMetadata, SkillSource};

use crate::{
    error::{Error, Result},
    multiplexer::{WatchBackend, WatchHandle},
};

/// Store with one skill per `(name, dir)` pair.
pub fn store_of(skills: &[(&str, &str)]) -> MetadataStore {
    MetadataStore::from_discovered(
        skills
            .iter()
            .map(|(name, dir)| SkillMetadata {
                name: (*name).to_string(),
                description: format!("{name} skill"),
                license: None,
                compatibility: None,
                allowed_tools: Vec::new(),
                path: PathBuf::from(dir),
                source: Some(SkillSource::Project),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<BackendCall>,
    live: HashMap<WatchHandle, PathBuf>,
    failing: HashSet<PathBuf>,
    next_id: u64,
}

/// Backend that records calls instead of touching the filesystem.
/// Clones share state, so a test can keep one while the engine owns another.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<Recorded>>,
}

#[allow(clippy::unwrap_used)]
impl RecordingBackend {
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().failing.insert(path.into());
    }

    pub fn allow(&self, path: impl AsRef<Path>) {
        self.inner.lock().unwrap().failing.remove(path.as_ref());
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn watch_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Watch(_)))
            .count()
    }

    /// Paths with a live watcher, sorted.
    pub fn live(&self) -> Vec<PathBuf> {
        let mut live: Vec<PathBuf> = self.inner.lock().unwrap().live.values().cloned().collect();
        live.sort();
        live
    }
}

#[allow(clippy::unwrap_used)]
impl WatchBackend for RecordingBackend {
    fn watch(&mut self, path: &Path) -> Result<WatchHandle> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(path) {
            return Err(Error::watch(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ));
        }
        inner.next_id += 1;
        let handle = WatchHandle(inner.next_id);
        inner.live.insert(handle, path.to_path_buf());
        inner.calls.push(BackendCall::Watch(path.to_path_buf()));
        Ok(handle)
    }

    fn unwatch(&mut self, handle: WatchHandle) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(path) = inner.live.remove(&handle) {
            inner.calls.push(BackendCall::Unwatch(path));
        }
    }
}
