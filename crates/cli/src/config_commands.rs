use {anyhow::Result, clap::Subcommand, skillport_config::SkillportConfig, skillport_skills::SkillDiscoverer};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file, env, and flags merged) as TOML.
    Show,
    /// Print where config files are looked up.
    Path,
}

pub fn handle_config(
    action: ConfigAction,
    config: &SkillportConfig,
    discoverer: &dyn SkillDiscoverer,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            eprintln!("\n# search roots, in priority order:");
            for root in discoverer.search_roots() {
                eprintln!("#   {}", root.display());
            }
        },
        ConfigAction::Path => {
            println!("./skillport.{{toml,yaml,yml,json}}");
            match skillport_config::config_dir() {
                Some(dir) => println!("{}/skillport.{{toml,yaml,yml,json}}", dir.display()),
                None => eprintln!("no user config directory on this platform"),
            }
        },
    }
    Ok(())
}
