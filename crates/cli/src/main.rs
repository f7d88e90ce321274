mod config_commands;
mod serve;
mod skills_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    skillport_config::SkillportConfig,
    skillport_skills::FsSkillDiscoverer,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "skillport", version, about = "Skillport: agent skills as live resources")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/skillport/).
    #[arg(long, global = true, env = "SKILLPORT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory holding personal skills.
    #[arg(long, global = true, env = "SKILLPORT_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Extra skill root, searched before every other root. Repeatable.
    #[arg(long = "skills-dir", global = true)]
    skills_dirs: Vec<PathBuf>,
    /// Search only explicitly configured roots.
    #[arg(long, global = true, default_value_t = false)]
    only_skills_dirs: bool,
    /// Debounce window in milliseconds (overrides config value).
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve skill resources over stdio (default when no subcommand is provided).
    Serve,
    /// Skill inspection.
    Skills {
        #[command(subcommand)]
        action: skills_commands::SkillAction,
    },
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Initialise tracing. Logs always go to stderr; stdout carries the protocol.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config file, then `SKILLPORT_*` env vars, then command-line flags.
fn resolve_config(cli: &Cli) -> SkillportConfig {
    let mut config = skillport_config::discover_and_load(cli.config_dir.as_deref());
    skillport_config::apply_env_overrides(&mut config);

    if !cli.skills_dirs.is_empty() {
        let mut merged = cli.skills_dirs.clone();
        merged.extend(std::mem::take(&mut config.skills.search_paths));
        config.skills.search_paths = merged;
    }
    if cli.only_skills_dirs {
        config.skills.only_search_paths = true;
    }
    if let Some(ms) = cli.debounce_ms {
        config.watch.debounce_ms = ms;
    }
    config
}

fn build_discoverer(cli: &Cli, config: &SkillportConfig) -> anyhow::Result<FsSkillDiscoverer> {
    let cwd = std::env::current_dir()?;
    let data_dir = skillport_config::data_dir(cli.data_dir.as_deref());
    Ok(FsSkillDiscoverer::new(FsSkillDiscoverer::default_paths(
        &cwd,
        &data_dir,
        &config.skills.search_paths,
        config.skills.include_agent_dirs,
        config.skills.only_search_paths,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "skillport starting");

    let config = resolve_config(&cli);
    let discoverer = build_discoverer(&cli, &config)?;

    match cli.command {
        None | Some(Commands::Serve) => serve::run(&config, discoverer).await,
        Some(Commands::Skills { action }) => {
            skills_commands::handle_skills(action, &discoverer).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config, &discoverer)
        },
    }
}
