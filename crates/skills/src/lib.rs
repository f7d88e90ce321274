//! Skills system: discovery, parsing, the metadata store, and path containment.
//!
//! Skills are directories containing a `SKILL.md` file with YAML frontmatter
//! and markdown instructions, following the Agent Skills open standard.

pub mod discover;
pub mod parse;
pub mod safety;
pub mod store;
pub mod types;
#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use {
    discover::{FsSkillDiscoverer, SkillDiscoverer},
    store::MetadataStore,
    types::{SKILL_MANIFEST, SkillMetadata, SkillRecord, SkillSource},
};
