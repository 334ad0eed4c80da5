use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use reposcan::config::{load_config, ScanConfig};
use reposcan::logging::{self, LogFormat};
use reposcan::provider::ProviderKind;

mod commands;

#[derive(Parser)]
#[command(name = "reposcan")]
#[command(about = "Scan repository archives and infer their test conventions")]
#[command(version)]
struct Cli {
    /// YAML config file (defaults are used when omitted)
    #[arg(short, long, env = "REPOSCAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long, env = "REPOSCAN_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Log output format: text or json
    #[arg(long, env = "REPOSCAN_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker pool until interrupted
    Serve {
        /// Override worker_count from the config
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Register (or update) a repository so it can be scanned
    Register {
        /// Repository id
        id: String,

        /// Provider the repository lives on (github or gitlab)
        #[arg(short, long)]
        provider: ProviderKind,

        /// Provider path, e.g. acme/widgets
        #[arg(short = 'f', long)]
        full_path: String,

        /// Display name (defaults to the last path segment)
        #[arg(short, long)]
        name: Option<String>,

        /// Branches to monitor
        #[arg(short, long = "branch")]
        branches: Vec<String>,
    },

    /// Queue a scan for a registered repository
    Enqueue {
        /// Repository id
        repository_id: String,

        /// Provider to download from
        #[arg(short, long)]
        provider: ProviderKind,

        /// Provider path (defaults to the registered full path)
        #[arg(short, long, default_value = "")]
        slug: String,
    },

    /// Show one job, or queue counts and recent jobs
    Status {
        /// Job id
        job_id: Option<String>,

        /// Number of recent jobs to list
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Print the stored test configuration for a repository
    ShowConfig {
        /// Repository id
        repository_id: String,
    },

    /// Set or clear the user's test folder preference
    SetPreference {
        /// Repository id
        repository_id: String,

        /// Preference as JSON; omit to clear
        value: Option<String>,
    },

    /// Run detection and inference on a local directory
    Detect {
        /// Directory to inspect
        path: PathBuf,
    },

    /// Remove abandoned working directories from the scratch dir
    Sweep,
}

fn load(cli: &Cli) -> Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScanConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format).context("Failed to initialize logging")?;

    let config = load(&cli)?;
    info!("Starting reposcan v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { workers } => commands::serve(config, workers).await,
        Commands::Register {
            id,
            provider,
            full_path,
            name,
            branches,
        } => commands::register(&config, &id, provider, &full_path, name, branches),
        Commands::Enqueue {
            repository_id,
            provider,
            slug,
        } => commands::enqueue(&config, &repository_id, provider, &slug).await,
        Commands::Status { job_id, limit } => {
            commands::status(&config, job_id.as_deref(), limit).await
        }
        Commands::ShowConfig { repository_id } => commands::show_config(&config, &repository_id),
        Commands::SetPreference {
            repository_id,
            value,
        } => commands::set_preference(&config, &repository_id, value.as_deref()),
        Commands::Detect { path } => commands::detect(&path),
        Commands::Sweep => commands::sweep(&config),
    }
}
