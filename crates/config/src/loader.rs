use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::SkillportConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillport.toml",
    "skillport.yaml",
    "skillport.yml",
    "skillport.json",
];

/// Env var holding extra skill roots (platform path-list syntax).
pub const ENV_SKILLS_PATHS: &str = "SKILLPORT_SKILLS_PATHS";
/// Env var overriding `watch.debounce_ms`.
pub const ENV_DEBOUNCE_MS: &str = "SKILLPORT_DEBOUNCE_MS";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SkillportConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the first config file found in `dir`, if any.
pub fn load_config_from_dir(dir: &Path) -> anyhow::Result<Option<SkillportConfig>> {
    match find_in_dir(dir) {
        Some(path) => load_config(&path).map(Some),
        None => Ok(None),
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillport.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/skillport.{toml,yaml,yml,json}` (explicit dir or user-global)
///
/// Returns `SkillportConfig::default()` if no config file is found or it fails to parse.
pub fn discover_and_load(config_dir_override: Option<&Path>) -> SkillportConfig {
    let global = config_dir_override.map(Path::to_path_buf).or_else(config_dir);
    let found = find_in_dir(Path::new(".")).or_else(|| global.as_deref().and_then(find_in_dir));

    let Some(path) = found else {
        debug!("no config file found, using defaults");
        return SkillportConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            SkillportConfig::default()
        },
    }
}

/// Apply `SKILLPORT_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut SkillportConfig) {
    apply_env_overrides_with(config, |name| std::env::var_os(name));
}

fn apply_env_overrides_with(
    config: &mut SkillportConfig,
    lookup: impl Fn(&str) -> Option<std::ffi::OsString>,
) {
    if let Some(paths) = lookup(ENV_SKILLS_PATHS) {
        // Env roots take priority over file-configured ones.
        let mut merged: Vec<PathBuf> = std::env::split_paths(&paths)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        merged.extend(std::mem::take(&mut config.skills.search_paths));
        config.skills.search_paths = merged;
    }

    if let Some(raw) = lookup(ENV_DEBOUNCE_MS) {
        match raw.to_string_lossy().trim().parse::<u64>() {
            Ok(ms) => config.watch.debounce_ms = ms,
            Err(e) => warn!(value = ?raw, error = %e, "ignoring invalid {ENV_DEBOUNCE_MS}"),
        }
    }
}

/// Returns the user-global config directory (`~/.config/skillport/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skillport").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory holding personal skills, honouring an explicit override.
pub fn data_dir(data_dir_override: Option<&Path>) -> PathBuf {
    if let Some(dir) = data_dir_override {
        return dir.to_path_buf();
    }
    directories::ProjectDirs::from("", "", "skillport")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".skillport"))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SkillportConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
