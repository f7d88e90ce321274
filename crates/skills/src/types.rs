use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name identifying a skill directory.
pub const SKILL_MANIFEST: &str = "SKILL.md";

/// Where a skill was discovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    /// Explicitly configured search path (config file, env, or `--skills-dir`).
    Configured,
    /// Project-local: `<cwd>/.skillport/skills/`
    Project,
    /// Personal: `<data_dir>/skills/`
    Personal,
    /// Shared agent directories: `.claude/skills/` in the project or home dir.
    Agent,
}

impl SkillSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Project => "project",
            Self::Personal => "personal",
            Self::Agent => "agent",
        }
    }
}

/// Lightweight metadata parsed from SKILL.md frontmatter.
/// Loaded during discovery for every skill (cheap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Skill name: lowercase, hyphens allowed, 1-64 chars.
    pub name: String,
    /// Short human-readable description.
    #[serde(default)]
    pub description: String,
    /// SPDX license identifier.
    #[serde(default)]
    pub license: Option<String>,
    /// Environment requirements (intended product, system packages, network access, etc.).
    #[serde(default)]
    pub compatibility: Option<String>,
    /// Tools this skill is allowed to use.
    #[serde(default, alias = "allowed-tools")]
    pub allowed_tools: Vec<String>,
    /// Filesystem path to the skill directory.
    #[serde(skip)]
    pub path: PathBuf,
    /// Where this skill was discovered.
    #[serde(skip)]
    pub source: Option<SkillSource>,
}

impl SkillMetadata {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(SKILL_MANIFEST)
    }
}

/// Full skill content: metadata + markdown body.
/// Loaded on demand when a skill is read.
#[derive(Debug, Clone)]
pub struct SkillContent {
    pub metadata: SkillMetadata,
    pub body: String,
}

/// One entry of the [`MetadataStore`](crate::store::MetadataStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillRecord {
    pub name: String,
    pub description: String,
    /// Absolute path of the skill's SKILL.md.
    pub manifest_path: PathBuf,
    pub source: SkillSource,
}

impl SkillRecord {
    /// Directory owning the manifest.
    pub fn skill_dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or(&self.manifest_path)
    }
}
