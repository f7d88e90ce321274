//! Config schema types (skill search roots, watch timing).

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillportConfig {
    pub skills: SkillsConfig,
    pub watch: WatchConfig,
}

/// Skills configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Extra directories to search for skills, highest priority first.
    pub search_paths: Vec<PathBuf>,
    /// Also scan `.claude/skills` in the working directory and home directory.
    pub include_agent_dirs: bool,
    /// Skip the built-in project/personal roots and use only `search_paths`.
    pub only_search_paths: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            include_agent_dirs: true,
            only_search_paths: false,
        }
    }
}

/// Live-update timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a burst of changes becomes one notification.
    pub debounce_ms: u64,
    /// How long a file must stop changing before a raw event is reported.
    pub settle_ms: u64,
    /// Rerun discovery when a SKILL.md under a search root changes.
    pub rescan_on_change: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            settle_ms: 50,
            rescan_on_change: true,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
