use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod paths;
mod provision;
mod sandbox;
mod sync;
mod versioning;

use commands::Session;
use config::Config;
use versioning::{SkillAction, DEFAULT_HISTORY_LIMIT};

#[derive(Parser)]
#[command(name = "automaton-sandbox")]
#[command(
    author,
    version,
    about = "Provision an automaton's sandbox and version its state"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.automaton/sandbox.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Conway API key
    #[arg(long, global = true, env = "CONWAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Adopt the running sandbox or create one
    Ensure,

    /// Sync local state files and skills into the sandbox
    Sync {
        /// Local state directory (default: from config)
        #[arg(long)]
        local_dir: Option<PathBuf>,
    },

    /// Initialize the state repository in the sandbox
    InitRepo,

    /// Commit pending state changes
    Commit {
        /// What changed
        description: String,

        /// Commit category, e.g. state, soul, skill, heartbeat, config
        #[arg(short = 'C', long, default_value = "state")]
        category: String,
    },

    /// Commit a skill install, removal or update
    Skill {
        /// Skill name
        name: String,

        /// What happened to the skill
        #[arg(value_enum)]
        action: SkillAction,
    },

    /// Show state history
    History {
        /// Number of commits to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Resolve a path inside the sandbox
    Resolve {
        /// Path to resolve (~, relative or absolute)
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("automaton_sandbox=debug")
        } else {
            EnvFilter::new("automaton_sandbox=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Resolve { path } = &cli.command {
        return commands::resolve::run(path);
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let session = Session::new(Config::load(&config_path)?, cli.api_key);

    match cli.command {
        Commands::Ensure => {
            commands::ensure::run(&session).await?;
        }
        Commands::Sync { local_dir } => {
            commands::sync::run(&session, local_dir).await?;
        }
        Commands::InitRepo => {
            commands::state::run_init(&session).await?;
        }
        Commands::Commit {
            description,
            category,
        } => {
            commands::state::run_commit(&session, &description, &category).await?;
        }
        Commands::Skill { name, action } => {
            commands::state::run_skill(&session, &name, action).await?;
        }
        Commands::History { limit } => {
            commands::state::run_history(&session, limit).await?;
        }
        Commands::Resolve { .. } => {}
    }

    Ok(())
}
