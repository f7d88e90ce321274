//! Immutable name → record table rebuilt on every discovery pass.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use {serde::Serialize, tracing::warn};

use crate::{
    discover::SkillDiscoverer,
    parse,
    types::{SkillContent, SkillMetadata, SkillRecord, SkillSource},
};

/// A skill name that was found in more than one search root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSkill {
    pub name: String,
    /// Manifest that was kept (highest priority root).
    pub kept: PathBuf,
    /// Manifest that was shadowed.
    pub skipped: PathBuf,
}

/// Snapshot of every discovered skill.
///
/// A store is never mutated after construction: discovery builds a fresh one
/// and callers swap the `Arc`, so a reader always sees a consistent table.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    skills: BTreeMap<String, SkillRecord>,
    duplicates: Vec<DuplicateSkill>,
}

impl MetadataStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a store from discovery output. Earlier entries win on name clashes.
    pub fn from_discovered(discovered: Vec<SkillMetadata>) -> Self {
        let mut skills: BTreeMap<String, SkillRecord> = BTreeMap::new();
        let mut duplicates = Vec::new();

        for meta in discovered {
            let manifest_path = meta.manifest_path();
            if let Some(existing) = skills.get(&meta.name) {
                warn!(
                    name = %meta.name,
                    kept = %existing.manifest_path.display(),
                    skipped = %manifest_path.display(),
                    "duplicate skill name, keeping higher-priority root"
                );
                duplicates.push(DuplicateSkill {
                    name: meta.name,
                    kept: existing.manifest_path.clone(),
                    skipped: manifest_path,
                });
                continue;
            }
            skills.insert(meta.name.clone(), SkillRecord {
                name: meta.name,
                description: meta.description,
                manifest_path,
                source: meta.source.unwrap_or(SkillSource::Configured),
            });
        }

        Self { skills, duplicates }
    }

    /// Run discovery and build a new snapshot.
    pub async fn rebuild(discoverer: &dyn SkillDiscoverer) -> anyhow::Result<Arc<Self>> {
        let discovered = discoverer.discover().await?;
        Ok(Arc::new(Self::from_discovered(discovered)))
    }

    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.get(name)
    }

    /// Records ordered by skill name.
    pub fn iter(&self) -> impl Iterator<Item = &SkillRecord> {
        self.skills.values()
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn duplicates(&self) -> &[DuplicateSkill] {
        &self.duplicates
    }

    /// Whether two snapshots expose the same skill names.
    pub fn same_names(&self, other: &Self) -> bool {
        self.skills.keys().eq(other.skills.keys())
    }

    /// Read and parse a skill's manifest from disk.
    pub async fn load_skill(&self, name: &str) -> anyhow::Result<SkillContent> {
        let record = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("skill '{}' not found", name))?;
        let content = tokio::fs::read_to_string(&record.manifest_path).await?;
        parse::parse_skill(&content, record.skill_dir())
    }
}
