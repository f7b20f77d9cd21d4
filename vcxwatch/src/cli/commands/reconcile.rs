//! One-shot reconciliation commands

use super::{build_orchestrator, print_outcome};
use anyhow::Result;
use vcxwatch_core::Config;

pub async fn run(config: Config) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let outcome = orchestrator.run().await;
    print_outcome(&outcome);
    Ok(())
}

pub async fn patrol(config: Config) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let outcome = orchestrator.patrol_for_changes().await;
    print_outcome(&outcome);
    Ok(())
}

pub async fn reset_cache(config: Config) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let count = orchestrator.reset_cache().await?;
    println!(
        "Reference cache reset: {} files committed to {}",
        count,
        config.cache_path().display()
    );
    Ok(())
}
