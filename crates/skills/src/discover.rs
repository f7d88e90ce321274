use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    parse,
    types::{SKILL_MANIFEST, SkillMetadata, SkillSource},
};

/// Discovers skills from filesystem paths.
#[async_trait]
pub trait SkillDiscoverer: Send + Sync {
    /// Scan configured paths and return metadata for all discovered skills,
    /// in priority order (earlier entries win on name clashes).
    async fn discover(&self) -> anyhow::Result<Vec<SkillMetadata>>;

    /// Directories scanned by [`discover`](Self::discover), for rescan triggers.
    fn search_roots(&self) -> Vec<PathBuf>;
}

/// Default filesystem-based skill discoverer.
pub struct FsSkillDiscoverer {
    /// (path, source) pairs to scan, in priority order.
    search_paths: Vec<(PathBuf, SkillSource)>,
}

impl FsSkillDiscoverer {
    pub fn new(search_paths: Vec<(PathBuf, SkillSource)>) -> Self {
        Self { search_paths }
    }

    /// Build the search paths for skill discovery.
    ///
    /// Priority: configured paths, then project, personal, and finally the
    /// shared agent directories when `include_agent_dirs` is set.
    pub fn default_paths(
        cwd: &Path,
        data_dir: &Path,
        configured: &[PathBuf],
        include_agent_dirs: bool,
        only_configured: bool,
    ) -> Vec<(PathBuf, SkillSource)> {
        let mut paths: Vec<(PathBuf, SkillSource)> = configured
            .iter()
            .map(|p| (absolutize(cwd, p), SkillSource::Configured))
            .collect();
        if only_configured {
            return paths;
        }

        paths.push((cwd.join(".skillport/skills"), SkillSource::Project));
        paths.push((data_dir.join("skills"), SkillSource::Personal));
        if include_agent_dirs {
            paths.push((cwd.join(".claude/skills"), SkillSource::Agent));
            if let Some(home) = directories::BaseDirs::new() {
                paths.push((home.home_dir().join(".claude/skills"), SkillSource::Agent));
            }
        }
        paths
    }
}

#[async_trait]
impl SkillDiscoverer for FsSkillDiscoverer {
    async fn discover(&self) -> anyhow::Result<Vec<SkillMetadata>> {
        let search_paths = self.search_paths.clone();
        let skills = tokio::task::spawn_blocking(move || {
            let mut skills = Vec::new();
            for (base_path, source) in &search_paths {
                if !base_path.is_dir() {
                    continue;
                }
                discover_root(base_path, *source, &mut skills);
            }
            skills
        })
        .await?;
        Ok(skills)
    }

    fn search_roots(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|(p, _)| p.clone()).collect()
    }
}

/// Scan a root: the root itself may be a skill, otherwise look one level deep.
fn discover_root(base_path: &Path, source: SkillSource, skills: &mut Vec<SkillMetadata>) {
    if base_path.join(SKILL_MANIFEST).is_file() {
        load_skill_dir(base_path, source, skills);
        return;
    }

    let mut dirs: Vec<PathBuf> = match std::fs::read_dir(base_path) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            tracing::warn!(path = %base_path.display(), %e, "failed to read skill root");
            return;
        },
    };
    // read_dir order is platform dependent; keep discovery deterministic.
    dirs.sort();

    for skill_dir in dirs {
        if skill_dir.join(SKILL_MANIFEST).is_file() {
            load_skill_dir(&skill_dir, source, skills);
        }
    }
}

fn load_skill_dir(skill_dir: &Path, source: SkillSource, skills: &mut Vec<SkillMetadata>) {
    let skill_md = skill_dir.join(SKILL_MANIFEST);
    let content = match std::fs::read_to_string(&skill_md) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(?skill_md, %e, "failed to read SKILL.md");
            return;
        },
    };
    let skill_dir = std::fs::canonicalize(skill_dir).unwrap_or_else(|_| skill_dir.to_path_buf());
    match parse::parse_metadata(&content, &skill_dir) {
        Ok(mut meta) => {
            meta.source = Some(source);
            skills.push(meta);
        },
        Err(e) => {
            tracing::warn!(?skill_dir, %e, "failed to parse SKILL.md");
        },
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(root: &Path, dir: &str, name: &str) {
        std::fs::create_dir_all(root.join(dir)).unwrap();
        std::fs::write(
            root.join(dir).join(SKILL_MANIFEST),
            format!("---\nname: {name}\ndescription: test {name}\n---\nbody\n"),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_discover_skills_in_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let skills_dir = tmp.path().join("skills");
        write_skill(&skills_dir, "my-skill", "my-skill");

        let discoverer = FsSkillDiscoverer::new(vec![(skills_dir.clone(), SkillSource::Project)]);
        let skills = discoverer.discover().await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "my-skill");
        assert_eq!(skills[0].source, Some(SkillSource::Project));
        assert!(skills[0].path.is_absolute());
    }

    #[tokio::test]
    async fn test_discover_results_are_sorted_per_root() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "zeta", "zeta");
        write_skill(tmp.path(), "alpha", "alpha");

        let discoverer =
            FsSkillDiscoverer::new(vec![(tmp.path().to_path_buf(), SkillSource::Configured)]);
        let names: Vec<String> = discoverer
            .discover()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_root_that_is_itself_a_skill() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(tmp.path(), "solo", "solo");

        let discoverer =
            FsSkillDiscoverer::new(vec![(tmp.path().join("solo"), SkillSource::Configured)]);
        let skills = discoverer.discover().await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "solo");
    }

    #[tokio::test]
    async fn test_discover_skips_missing_dirs() {
        let discoverer = FsSkillDiscoverer::new(vec![(
            PathBuf::from("/nonexistent/path"),
            SkillSource::Personal,
        )]);
        let skills = discoverer.discover().await.unwrap();
        assert!(skills.is_empty());
    }

    #[tokio::test]
    async fn test_discover_skips_dirs_without_skill_md() {
        let tmp = tempfile::tempdir().unwrap();
        let skills_dir = tmp.path().join("skills");
        std::fs::create_dir_all(skills_dir.join("not-a-skill")).unwrap();
        std::fs::write(skills_dir.join("not-a-skill/README.md"), "hello").unwrap();

        let discoverer = FsSkillDiscoverer::new(vec![(skills_dir, SkillSource::Project)]);
        let skills = discoverer.discover().await.unwrap();
        assert!(skills.is_empty());
    }

    #[tokio::test]
    async fn test_discover_skips_invalid_frontmatter() {
        let tmp = tempfile::tempdir().unwrap();
        let skills_dir = tmp.path().join("skills");
        std::fs::create_dir_all(skills_dir.join("bad-skill")).unwrap();
        std::fs::write(skills_dir.join("bad-skill/SKILL.md"), "no frontmatter here").unwrap();

        let discoverer = FsSkillDiscoverer::new(vec![(skills_dir, SkillSource::Project)]);
        let skills = discoverer.discover().await.unwrap();
        assert!(skills.is_empty());
    }

    #[test]
    fn test_only_configured_skips_builtin_roots() {
        let paths = FsSkillDiscoverer::default_paths(
            Path::new("/work"),
            Path::new("/data"),
            &[PathBuf::from("extra")],
            true,
            true,
        );
        assert_eq!(paths, vec![(PathBuf::from("/work/extra"), SkillSource::Configured)]);
    }

    #[test]
    fn test_default_paths_priority_order() {
        let paths =
            FsSkillDiscoverer::default_paths(Path::new("/work"), Path::new("/data"), &[], false, false);
        assert_eq!(paths, vec![
            (PathBuf::from("/work/.skillport/skills"), SkillSource::Project),
            (PathBuf::from("/data/skills"), SkillSource::Personal),
        ]);
    }
}
