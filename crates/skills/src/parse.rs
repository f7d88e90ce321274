use std::path::Path;

use anyhow::{Context, bail};

use crate::types::{SkillContent, SkillMetadata};

/// Validate a skill name: lowercase ASCII, digits, hyphens, 1-64 chars.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// Parse a SKILL.md file into metadata only (frontmatter).
pub fn parse_metadata(content: &str, skill_dir: &Path) -> anyhow::Result<SkillMetadata> {
    let (frontmatter, _body) = split_frontmatter(content)?;
    metadata_from_frontmatter(frontmatter, skill_dir)
}

/// Parse a SKILL.md file into full content (metadata + body).
pub fn parse_skill(content: &str, skill_dir: &Path) -> anyhow::Result<SkillContent> {
    let (frontmatter, body) = split_frontmatter(content)?;
    Ok(SkillContent {
        metadata: metadata_from_frontmatter(frontmatter, skill_dir)?,
        body: body.to_string(),
    })
}

fn metadata_from_frontmatter(frontmatter: &str, skill_dir: &Path) -> anyhow::Result<SkillMetadata> {
    let mut meta: SkillMetadata =
        serde_yaml::from_str(frontmatter).context("invalid SKILL.md frontmatter")?;

    if !validate_name(&meta.name) {
        bail!(
            "invalid skill name '{}': must be 1-64 lowercase alphanumeric/hyphen chars",
            meta.name
        );
    }

    meta.description = meta.description.trim().to_string();
    meta.path = skill_dir.to_path_buf();
    Ok(meta)
}

/// Split SKILL.md content at `---` delimiters into (frontmatter, body).
fn split_frontmatter(content: &str) -> anyhow::Result<(&str, &str)> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        bail!("SKILL.md must start with YAML frontmatter delimited by ---");
    };

    let close_pos = after_open
        .find("\n---")
        .context("SKILL.md missing closing --- for frontmatter")?;

    let frontmatter = after_open[..close_pos].trim();
    let body = after_open[close_pos + 4..].trim();
    Ok((frontmatter, body))
}
