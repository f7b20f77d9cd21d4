//! Watch command - continuous monitoring until Ctrl-C

use super::build_orchestrator;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vcxwatch_core::monitor::{
    Debouncer, DebouncerConfig, EventFilter, EventPipeline, FileWatcher, OrchestratorTrigger,
};
use vcxwatch_core::{Config, Orchestrator, RunOutcome};

/// How long shutdown waits for the pipeline to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn execute(config: Config) -> Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let monitor = config.monitor_config();

    info!("Checking for files removed while not watching");
    if let RunOutcome::Completed(report) = orchestrator.patrol_for_changes().await {
        if let Some(e) = report.error {
            warn!("Startup patrol failed: {}", e);
        }
    }

    let (handle, rx) = FileWatcher::new(monitor.watch_roots.clone())
        .start()
        .context("Failed to start file watcher")?;

    let debouncer = Debouncer::new(
        DebouncerConfig { interval: monitor.debounce, trigger_interval: monitor.trigger_debounce },
        Arc::new(OrchestratorTrigger::new(orchestrator.clone())),
    );
    let pipeline = EventPipeline::new(EventFilter::new(&monitor), debouncer);
    let mut pipeline_task = tokio::spawn(pipeline.run(rx));

    let patrol_task = config.patrol_interval().map(|period| {
        info!("Patrolling every {} minutes", config.patrol_interval_minutes);
        tokio::spawn(patrol_loop(orchestrator.clone(), period))
    });

    println!("Watching {} directories. Press Ctrl-C to stop.", handle.roots().len());
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    if let Some(task) = patrol_task {
        task.abort();
    }
    drop(handle);
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut pipeline_task).await.is_err() {
        debug!("Pipeline did not stop in time, aborting it");
        pipeline_task.abort();
    }

    // Let an in-flight run finish before exiting
    orchestrator.cached().await;
    info!("Stopped");
    Ok(())
}

async fn patrol_loop(orchestrator: Arc<Orchestrator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; startup already patrolled
    interval.tick().await;
    loop {
        interval.tick().await;
        orchestrator.patrol_for_changes().await;
    }
}
