//! Identifier → filesystem paths.

use std::path::PathBuf;

use skillport_skills::{MetadataStore, safety::join_within};

use crate::uri::{ResourceKind, ResourceUri};

/// Paths `uri` depends on under `store`, in a stable order.
///
/// Empty means "not found" (unknown skill, malformed identifier, or a file
/// path escaping its skill directory); it is not an error. The same inputs
/// always produce the same output, which is what lets reconcile diff safely.
pub fn resolve(uri: &ResourceUri, store: &MetadataStore) -> Vec<PathBuf> {
    let Some(kind) = uri.kind() else {
        return Vec::new();
    };

    match kind {
        ResourceKind::AllSkills => {
            let mut dirs: Vec<PathBuf> = Vec::with_capacity(store.len());
            for record in store.iter() {
                let dir = record.skill_dir().to_path_buf();
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
            dirs
        },
        ResourceKind::Manifest { skill } => store
            .get(skill)
            .map(|record| vec![record.manifest_path.clone()])
            .unwrap_or_default(),
        ResourceKind::Collection { skill } => store
            .get(skill)
            .map(|record| vec![record.skill_dir().to_path_buf()])
            .unwrap_or_default(),
        ResourceKind::File { skill, relative } => store
            .get(skill)
            .and_then(|record| join_within(record.skill_dir(), relative))
            .into_iter()
            .collect(),
    }
}
