use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forksync::{Config, SyncEngine, SyncOutcome};

#[derive(Parser)]
#[command(name = "forksync")]
#[command(about = "Synchronize forked repositories with their upstream parents")]
#[command(version)]
struct Cli {
    /// GitHub username whose forks should be synchronized
    #[arg(short, long)]
    username: Option<String>,

    /// Local root directory that holds the repository clones
    #[arg(short, long)]
    directory: Option<String>,

    /// GitHub API token
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Configuration file path (YAML)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Maximum concurrent GitHub detail requests
    #[arg(long)]
    github_concurrency: Option<usize>,

    /// Maximum concurrent repository synchronizations (unbounded when omitted)
    #[arg(long)]
    git_concurrency: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    info!("Starting forksync v{}", env!("CARGO_PKG_VERSION"));

    let config = build_config(cli)?;

    // The root directory also receives the run log
    std::fs::create_dir_all(config.root())
        .with_context(|| format!("Failed to create root directory: {}", config.directory))?;

    let engine = SyncEngine::new(config).context("Failed to create sync engine")?;
    let summary = engine.run().await.context("Synchronization run failed")?;

    println!("\nSynchronization complete");
    println!("   Total forks:  {}", summary.total_repositories);
    println!("   Synchronized: {}", summary.synced);
    println!("   Failed:       {}", summary.failed);
    println!("   Duration:     {:.2}s", summary.duration.as_secs_f64());

    if summary.failed > 0 {
        println!("\nFailed repositories:");
        for outcome in &summary.outcomes {
            if let SyncOutcome::Failed { full_name, error } = outcome {
                println!("   {}: {}", full_name, error);
            }
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Merge the optional config file with CLI overrides and validate the result.
fn build_config(cli: Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(username) = cli.username {
        config.username = username;
    }
    if let Some(directory) = cli.directory {
        config.directory = directory;
    }
    if let Some(token) = cli.token {
        config.token = token;
    }
    if let Some(limit) = cli.github_concurrency {
        config.github_concurrency = limit;
    }
    if cli.git_concurrency.is_some() {
        config.git_concurrency = cli.git_concurrency;
    }

    config.expand_paths()?;
    config.validate()?;

    Ok(config)
}
