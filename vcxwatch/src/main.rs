use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init(args) => {
            cli::commands::init::execute(args, config_path)?;
        }
        Commands::Check => {
            let config = cli::commands::read_config(config_path, cli.dry_run)?;
            cli::commands::check::execute(&config)?;
        }
        Commands::Orphans => {
            let config = cli::commands::load_config(config_path, cli.dry_run)?;
            cli::commands::orphans::execute(&config)?;
        }
        Commands::Watch => {
            let config = cli::commands::load_config(config_path, cli.dry_run)?;
            info!("Starting watcher");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::watch::execute(config))?;
        }
        Commands::Run => {
            let config = cli::commands::load_config(config_path, cli.dry_run)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::reconcile::run(config))?;
        }
        Commands::Patrol => {
            let config = cli::commands::load_config(config_path, cli.dry_run)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::reconcile::patrol(config))?;
        }
        Commands::ResetCache => {
            let config = cli::commands::load_config(config_path, cli.dry_run)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::reconcile::reset_cache(config))?;
        }
    }

    Ok(())
}
