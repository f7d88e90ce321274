use {
    anyhow::Result,
    clap::Subcommand,
    skillport_resources::ResourceUri,
    skillport_skills::{MetadataStore, SkillDiscoverer},
};

#[derive(Subcommand)]
pub enum SkillAction {
    /// List all discovered skills.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show details about a skill.
    Info {
        /// Skill name.
        name: String,
    },
    /// Show the search roots, in priority order.
    Roots,
}

pub async fn handle_skills(action: SkillAction, discoverer: &dyn SkillDiscoverer) -> Result<()> {
    match action {
        SkillAction::List { json } => {
            let store = MetadataStore::rebuild(discoverer).await?;
            if json {
                let records: Vec<_> = store.iter().collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            if store.is_empty() {
                println!("No skills found.");
            } else {
                for skill in store.iter() {
                    println!(
                        "  {} — {} [{}]",
                        skill.name,
                        skill.description,
                        skill.source.label()
                    );
                }
            }
            for dup in store.duplicates() {
                eprintln!(
                    "warning: '{}' at {} is shadowed by {}",
                    dup.name,
                    dup.skipped.display(),
                    dup.kept.display()
                );
            }
        },
        SkillAction::Info { name } => {
            let store = MetadataStore::rebuild(discoverer).await?;
            let content = store.load_skill(&name).await?;
            let meta = &content.metadata;
            println!("Name:        {}", meta.name);
            println!("Description: {}", meta.description);
            if let Some(ref license) = meta.license {
                println!("License:     {license}");
            }
            if let Some(ref compatibility) = meta.compatibility {
                println!("Requires:    {compatibility}");
            }
            if !meta.allowed_tools.is_empty() {
                println!("Tools:       {}", meta.allowed_tools.join(", "));
            }
            println!("Path:        {}", meta.path.display());
            if let Some(record) = store.get(&name) {
                println!("Source:      {}", record.source.label());
            }
            println!("Resource:    {}", ResourceUri::manifest(&meta.name));
            println!("\n{}", content.body);
        },
        SkillAction::Roots => {
            for root in discoverer.search_roots() {
                let marker = if root.is_dir() { "" } else { " (missing)" };
                println!("  {}{marker}", root.display());
            }
        },
    }

    Ok(())
}
