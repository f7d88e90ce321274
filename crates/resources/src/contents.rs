//! Listing and reading resources.
//!
//! Reads always go to disk at call time; only the metadata store is cached.

use std::path::{Path, PathBuf};

use {
    serde::Serialize,
    skillport_skills::{MetadataStore, SkillRecord, safety::is_within_base},
    tracing::debug,
    walkdir::WalkDir,
};

use crate::{
    error::{Context, Error, Result},
    resolve::resolve,
    uri::{ResourceKind, ResourceUri},
};

const MIME_MARKDOWN: &str = "text/markdown";
const MIME_JSON: &str = "application/json";
const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: ResourceUri,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: ResourceUri,
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct SkillSummary<'a> {
    name: &'a str,
    description: &'a str,
    uri: ResourceUri,
}

/// `skill://` followed by a manifest and a collection entry per skill.
pub fn list_resources(store: &MetadataStore) -> Vec<ResourceEntry> {
    let mut entries = Vec::with_capacity(1 + store.len() * 2);
    entries.push(ResourceEntry {
        uri: ResourceUri::all_skills(),
        name: "skills".into(),
        description: Some(format!("All {} available skills", store.len())),
        mime_type: MIME_JSON.into(),
    });
    for record in store.iter() {
        entries.push(ResourceEntry {
            uri: ResourceUri::manifest(&record.name),
            name: record.name.clone(),
            description: Some(record.description.clone()).filter(|d| !d.is_empty()),
            mime_type: MIME_MARKDOWN.into(),
        });
        entries.push(ResourceEntry {
            uri: ResourceUri::collection(&record.name),
            name: format!("{}/", record.name),
            description: Some(format!("Files of the {} skill", record.name)),
            mime_type: MIME_JSON.into(),
        });
    }
    entries
}

/// Read the current contents of `uri`.
pub async fn read_resource(store: &MetadataStore, uri: &ResourceUri) -> Result<ResourceContents> {
    let kind = uri.kind().ok_or_else(|| Error::not_found(uri.as_str()))?;
    match kind {
        ResourceKind::AllSkills => {
            let summaries: Vec<SkillSummary<'_>> = store.iter().map(summary).collect();
            Ok(ResourceContents {
                uri: uri.clone(),
                mime_type: MIME_JSON.into(),
                text: serde_json::to_string_pretty(&summaries)?,
            })
        },
        ResourceKind::Manifest { skill } => {
            let record = record(store, skill, uri)?;
            let text = read_text(&record.manifest_path, uri).await?;
            Ok(ResourceContents {
                uri: uri.clone(),
                mime_type: MIME_MARKDOWN.into(),
                text,
            })
        },
        ResourceKind::Collection { skill } => {
            let record = record(store, skill, uri)?;
            let dir = record.skill_dir().to_path_buf();
            let name = record.name.clone();
            let files = tokio::task::spawn_blocking(move || list_files(&dir))
                .await
                .map_err(|e| Error::Message {
                    message: format!("file listing task failed: {e}"),
                })?;
            let uris: Vec<ResourceUri> = files
                .iter()
                .map(|relative| ResourceUri::file(&name, relative))
                .collect();
            Ok(ResourceContents {
                uri: uri.clone(),
                mime_type: MIME_JSON.into(),
                text: serde_json::to_string_pretty(&uris)?,
            })
        },
        ResourceKind::File { relative, .. } => {
            let path = resolve(uri, store)
                .into_iter()
                .next()
                .ok_or_else(|| Error::not_found(uri.as_str()))?;
            if !path.is_file() {
                return Err(Error::not_found(uri.as_str()));
            }
            let text = read_text(&path, uri).await?;
            Ok(ResourceContents {
                uri: uri.clone(),
                mime_type: mime_for(relative).into(),
                text,
            })
        },
    }
}

fn summary(record: &SkillRecord) -> SkillSummary<'_> {
    SkillSummary {
        name: &record.name,
        description: &record.description,
        uri: ResourceUri::manifest(&record.name),
    }
}

fn record<'a>(store: &'a MetadataStore, skill: &str, uri: &ResourceUri) -> Result<&'a SkillRecord> {
    store.get(skill).ok_or_else(|| Error::not_found(uri.as_str()))
}

async fn read_text(path: &Path, uri: &ResourceUri) -> Result<String> {
    let result = tokio::fs::read_to_string(path).await;
    if let Err(e) = &result
        && e.kind() == std::io::ErrorKind::NotFound
    {
        return Err(Error::not_found(uri.as_str()));
    }
    result.with_context(|| format!("failed to read {}", path.display()))
}

/// Regular files under `dir`, relative and `/`-separated, sorted.
/// Entries whose real location is outside `dir` are skipped.
fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                None
            },
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_within_base(entry.path(), dir))
        .filter_map(|entry| relative_slash_path(entry.path(), dir))
        .collect();
    files.sort();
    files
}

fn relative_slash_path(path: &Path, base: &Path) -> Option<String> {
    let relative: PathBuf = path.strip_prefix(base).ok()?.to_path_buf();
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn mime_for(relative: &str) -> &'static str {
    match Path::new(relative).extension().and_then(|e| e.to_str()) {
        Some("md") => MIME_MARKDOWN,
        Some("json") => MIME_JSON,
        _ => MIME_TEXT,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        skillport_skills::{SkillMetadata, SkillSource},
    };

    fn fixture() -> (tempfile::TempDir, MetadataStore) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pdf");
        std::fs::create_dir_all(dir.join("scripts")).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            "---\nname: pdf\ndescription: PDF tools\n---\nUse it.\n",
        )
        .unwrap();
        std::fs::write(dir.join("scripts/merge.py"), "print('merge')\n").unwrap();
        std::fs::write(dir.join("notes.md"), "# notes\n").unwrap();
        let store = MetadataStore::from_discovered(vec![SkillMetadata {
            name: "pdf".into(),
            description: "PDF tools".into(),
            license: None,
            compatibility: None,
            allowed_tools: Vec::new(),
            path: dir,
            source: Some(SkillSource::Project),
        }]);
        (tmp, store)
    }

    #[test]
    fn listing_has_catalog_manifest_and_collection() {
        let (_tmp, store) = fixture();
        let uris: Vec<String> = list_resources(&store)
            .into_iter()
            .map(|e| e.uri.to_string())
            .collect();
        assert_eq!(uris, vec!["skill://", "skill://pdf", "skill://pdf/"]);
    }

    #[tokio::test]
    async fn catalog_lists_skill_summaries() {
        let (_tmp, store) = fixture();
        let contents = read_resource(&store, &ResourceUri::all_skills()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(value[0]["name"], "pdf");
        assert_eq!(value[0]["description"], "PDF tools");
        assert_eq!(value[0]["uri"], "skill://pdf");
    }

    #[tokio::test]
    async fn manifest_read_sees_latest_disk_content() {
        let (tmp, store) = fixture();
        let uri = ResourceUri::manifest("pdf");
        assert!(read_resource(&store, &uri).await.unwrap().text.contains("Use it."));

        std::fs::write(tmp.path().join("pdf/SKILL.md"), "---\nname: pdf\n---\nChanged.\n").unwrap();
        let contents = read_resource(&store, &uri).await.unwrap();
        assert!(contents.text.contains("Changed."));
        assert_eq!(contents.mime_type, MIME_MARKDOWN);
    }

    #[tokio::test]
    async fn collection_lists_files_as_uris() {
        let (_tmp, store) = fixture();
        let contents = read_resource(&store, &ResourceUri::collection("pdf")).await.unwrap();
        let uris: Vec<String> = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(uris, vec![
            "skill://pdf/SKILL.md",
            "skill://pdf/notes.md",
            "skill://pdf/scripts/merge.py",
        ]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collection_skips_symlinks_leaving_the_skill() {
        let (tmp, store) = fixture();
        let secret = tmp.path().join("secret.txt");
        std::fs::write(&secret, "nope").unwrap();
        std::os::unix::fs::symlink(&secret, tmp.path().join("pdf/leak.txt")).unwrap();

        let contents = read_resource(&store, &ResourceUri::collection("pdf")).await.unwrap();
        assert!(!contents.text.contains("leak.txt"));
        let err = read_resource(&store, &ResourceUri::file("pdf", "leak.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn file_reads_are_contained() {
        let (_tmp, store) = fixture();
        let ok = read_resource(&store, &ResourceUri::file("pdf", "scripts/merge.py"))
            .await
            .unwrap();
        assert_eq!(ok.text, "print('merge')\n");
        assert_eq!(ok.mime_type, MIME_TEXT);

        for uri in [
            ResourceUri::file("pdf", "../../etc/passwd"),
            ResourceUri::file("pdf", "missing.md"),
            ResourceUri::file("pdf", "scripts"),
            ResourceUri::manifest("git"),
            ResourceUri::new("bogus"),
        ] {
            let err = read_resource(&store, &uri).await.unwrap_err();
            assert!(err.is_not_found(), "{uri}");
        }
    }
}
