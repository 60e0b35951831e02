mod cmd;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use sprinkler_core::Config;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Parser)]
#[command(
    name = "sprinkler",
    about = "Drive the sprinkler relay from the remote on/off document",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML config (missing file = built-in defaults)
    #[arg(
        long,
        global = true,
        env = "SPRINKLER_CONFIG",
        default_value = "sprinkler.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the document and drive the relay until interrupted (default)
    Run {
        /// Log relay commands instead of touching the GPIO line
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // A broken config is reported by the command itself; logging just falls
    // back to stderr.
    let log_file = Config::load(&cli.config).ok().and_then(|c| c.log.file);
    if let Err(e) = init_tracing(log_file.as_deref()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    let result = match cli.command {
        None => cmd::run::run(&cli.config, false),
        Some(Commands::Run { dry_run }) => cmd::run::run(&cli.config, dry_run),
        Some(Commands::Config { subcommand }) => cmd::config::run(&cli.config, subcommand),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
