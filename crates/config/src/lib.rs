//! Configuration loading, env substitution, and env-var overrides.
//!
//! Config files: `skillport.toml`, `skillport.yaml`, or `skillport.json`
//! Searched in `./` then `~/.config/skillport/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, load_config,
        load_config_from_dir,
    },
    schema::{SkillportConfig, SkillsConfig, WatchConfig},
};
