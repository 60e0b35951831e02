use anyhow::Context;
use clap::Subcommand;
use sprinkler_core::Config;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config as YAML
    Show,

    /// Load and validate the config file
    Validate,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcommand: ConfigSubcommand) -> anyhow::Result<()> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    match subcommand {
        ConfigSubcommand::Show => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigSubcommand::Validate => {
            if path.exists() {
                println!("{}: ok", path.display());
            } else {
                println!("{}: not found, using defaults", path.display());
            }
        }
    }
    Ok(())
}
